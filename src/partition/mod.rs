//! Partition store
//!
//! Each partition is a directory holding three sibling files that share a
//! base name and an extension:
//!
//! ```text
//! root/
//! └── journal/
//!     ├── journal.index.bin    id -> IndexEntry, plus "entry_count"
//!     ├── journal.bin          id -> payload
//!     └── journal.ox-vec.bin   id -> embedding (or null)
//! ```
//!
//! Every file is loaded whole, mutated in memory and rewritten whole. A
//! record write touches the three files in the fixed order index, payload,
//! vector; there is no cross-file atomicity, so a failure after the first
//! write is reported as [`OxError::PartialWrite`] naming the stores that
//! were already written.

mod layout;

pub use layout::{detect_format, validate_name, PartitionLayout, SubStore};

use crate::codec::{CodecError, DocFormat, Mapping};
use crate::defaults::{ENTRY_COUNT_KEY, ID_SEPARATOR, MAX_ID_ATTEMPTS, SENTINEL_KEY};
use crate::embedder::ensure_finite;
use crate::error::{OxError, Result};
use crate::record::{IndexEntry, Record};
use crate::storage::{BlockStorage, StorageError};
use serde_json::Value;
use std::sync::Arc;

/// How a save relates to the record count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A new record was added; bumps `entry_count` when saving the index
    Insertion,
    /// Anything else; `entry_count` is left as is
    Overwrite,
}

/// Keys that are not record identifiers
pub fn is_reserved(key: &str) -> bool {
    key == SENTINEL_KEY || key == ENTRY_COUNT_KEY
}

fn entry_count_of(index: &Mapping) -> u64 {
    index
        .get(ENTRY_COUNT_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// First ordinal above every record key in `mapping`
///
/// Keys without a leading ordinal still count as one record each.
fn next_ordinal(mapping: &Mapping) -> u64 {
    let records: Vec<&String> = mapping.keys().filter(|k| !is_reserved(k)).collect();
    let above_ordinals = records
        .iter()
        .filter_map(|k| k.split(ID_SEPARATOR).next()?.parse::<u64>().ok())
        .map(|o| o.saturating_add(1))
        .max()
        .unwrap_or(0);
    above_ordinals.max(records.len() as u64)
}

/// The three keyed sub-stores of one partition
pub struct PartitionStore {
    layout: PartitionLayout,
    storage: Arc<dyn BlockStorage>,
}

impl PartitionStore {
    /// Open or create a partition, making sure all three files exist
    pub fn open(storage: Arc<dyn BlockStorage>, name: &str, format: DocFormat) -> Result<Self> {
        validate_name(name)?;
        storage.create_dir(name)?;

        let store = Self {
            layout: PartitionLayout::new(name, format),
            storage,
        };

        for sub in SubStore::ALL {
            store.load(sub)?;
        }

        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn format(&self) -> DocFormat {
        self.layout.format
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    /// Load a whole sub-store; a missing file is created with the sentinel entry
    ///
    /// An index without `entry_count` (new, emptied or rewritten by hand) is
    /// seeded past every record still present in any of the three files.
    pub fn load(&self, store: SubStore) -> Result<Mapping> {
        let path = self.layout.path(store);
        let (mut mapping, created) = match self.storage.read(&path) {
            Ok(bytes) => (
                self.layout
                    .format
                    .decode(&bytes)
                    .map_err(|e| OxError::corrupt(&path, e))?,
                false,
            ),
            Err(StorageError::NotFound { .. }) => {
                let mut mapping = Mapping::new();
                mapping.insert(
                    SENTINEL_KEY.to_string(),
                    Value::String(self.layout.file_key(store)),
                );
                (mapping, true)
            }
            Err(e) => return Err(e.into()),
        };

        if store == SubStore::Index && !mapping.contains_key(ENTRY_COUNT_KEY) {
            let count = [
                next_ordinal(&mapping),
                next_ordinal(&self.load(SubStore::Payload)?),
                next_ordinal(&self.load(SubStore::Vector)?),
            ]
            .into_iter()
            .max()
            .unwrap_or(0);
            mapping.insert(ENTRY_COUNT_KEY.to_string(), Value::from(count));
        }

        if created {
            self.save(store, &mut mapping, WriteKind::Overwrite)?;
            tracing::debug!(partition = %self.layout.name, file = %path, "created partition file");
        }
        Ok(mapping)
    }

    /// Rewrite a whole sub-store
    pub fn save(&self, store: SubStore, mapping: &mut Mapping, kind: WriteKind) -> Result<()> {
        if store == SubStore::Index && kind == WriteKind::Insertion {
            let count = entry_count_of(mapping) + 1;
            mapping.insert(ENTRY_COUNT_KEY.to_string(), Value::from(count));
        }

        let path = self.layout.path(store);
        let bytes = self
            .layout
            .format
            .encode(mapping)
            .map_err(|e| OxError::Internal(format!("encode {path}: {e}")))?;
        self.storage.write(&path, &bytes)?;
        self.storage.sync(&path)?;

        Ok(())
    }

    /// Number of records ever inserted
    pub fn entry_count(&self) -> Result<u64> {
        Ok(entry_count_of(&self.load(SubStore::Index)?))
    }

    /// Index entry of an existing record
    pub fn entry(&self, id: &str) -> Result<IndexEntry> {
        let index = self.load(SubStore::Index)?;
        match index.get(id) {
            Some(value) if !is_reserved(id) => {
                serde_json::from_value(value.clone()).map_err(|e| {
                    OxError::corrupt(
                        self.layout.path(SubStore::Index),
                        CodecError::Malformed(format!("entry {id}: {e}")),
                    )
                })
            }
            _ => Err(OxError::not_found(&self.layout.name, id)),
        }
    }

    /// Load all three sub-stores
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            index: self.load(SubStore::Index)?,
            payload: self.load(SubStore::Payload)?,
            vectors: self.load(SubStore::Vector)?,
            index_file: self.layout.path(SubStore::Index),
        })
    }

    /// Add a new record
    ///
    /// `make_entry` receives the record's ordinal and is called again if the
    /// identifier it produced already exists in the index.
    pub fn append(
        &self,
        payload: &Value,
        vector: Option<&[f32]>,
        mut make_entry: impl FnMut(u64) -> IndexEntry,
    ) -> Result<IndexEntry> {
        vector.map(ensure_finite).transpose()?;
        let mut index = self.load(SubStore::Index)?;
        let ordinal = entry_count_of(&index);

        let entry = (0..MAX_ID_ATTEMPTS)
            .map(|_| make_entry(ordinal))
            .find(|e| !index.contains_key(&e.id) && !is_reserved(&e.id))
            .ok_or_else(|| {
                OxError::Internal(format!(
                    "no free identifier after {MAX_ID_ATTEMPTS} attempts in {}",
                    self.layout.name
                ))
            })?;

        index.insert(entry.id.clone(), entry_value(&entry)?);
        self.save(SubStore::Index, &mut index, WriteKind::Insertion)?;
        self.write_rest(&entry.id, payload, vector)?;

        Ok(entry)
    }

    /// Replace payload and vector of an existing record
    pub fn overwrite(
        &self,
        id: &str,
        entry: &IndexEntry,
        payload: &Value,
        vector: Option<&[f32]>,
    ) -> Result<()> {
        vector.map(ensure_finite).transpose()?;
        let mut index = self.load(SubStore::Index)?;
        if is_reserved(id) || !index.contains_key(id) {
            return Err(OxError::not_found(&self.layout.name, id));
        }

        index.insert(id.to_string(), entry_value(entry)?);
        self.save(SubStore::Index, &mut index, WriteKind::Overwrite)?;
        self.write_rest(id, payload, vector)
    }

    /// Set vectors of existing records in one rewrite of the vector file
    pub fn put_vectors(&self, vectors: &[(String, Vec<f32>)]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        for (_, vector) in vectors {
            ensure_finite(vector)?;
        }

        let mut mapping = self.load(SubStore::Vector)?;
        for (id, vector) in vectors {
            mapping.insert(id.clone(), Value::from(vector.clone()));
        }
        self.save(SubStore::Vector, &mut mapping, WriteKind::Overwrite)
    }

    fn write_rest(&self, id: &str, payload: &Value, vector: Option<&[f32]>) -> Result<()> {
        let vector = vector.map(Value::from).unwrap_or(Value::Null);
        let mut written = vec![SubStore::Index];

        for (store, value) in [(SubStore::Payload, payload.clone()), (SubStore::Vector, vector)] {
            if let Err(source) = self.put(store, id, value) {
                tracing::warn!(
                    partition = %self.layout.name,
                    id,
                    failed = %store,
                    error = %source,
                    "record left partially written"
                );
                return Err(OxError::PartialWrite {
                    id: id.to_string(),
                    written,
                    failed: store,
                    source: Box::new(source),
                });
            }
            written.push(store);
        }

        Ok(())
    }

    fn put(&self, store: SubStore, id: &str, value: Value) -> Result<()> {
        let mut mapping = self.load(store)?;
        mapping.insert(id.to_string(), value);
        self.save(store, &mut mapping, WriteKind::Overwrite)
    }
}

fn entry_value(entry: &IndexEntry) -> Result<Value> {
    serde_json::to_value(entry).map_err(|e| OxError::Internal(e.to_string()))
}

/// In-memory copy of all three sub-stores
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: Mapping,
    pub payload: Mapping,
    pub vectors: Mapping,
    index_file: String,
}

impl Snapshot {
    /// Decoded index entries, skipping reserved keys
    ///
    /// Entries that fail to decode are returned as failures.
    pub fn entries(&self) -> (Vec<IndexEntry>, Vec<OxError>) {
        let mut entries = Vec::new();
        let mut failures = Vec::new();

        for (id, value) in self.index.iter().filter(|(k, _)| !is_reserved(k)) {
            match serde_json::from_value::<IndexEntry>(value.clone()) {
                Ok(entry) => entries.push(entry),
                Err(e) => failures.push(OxError::corrupt(
                    &self.index_file,
                    CodecError::Malformed(format!("entry {id}: {e}")),
                )),
            }
        }

        (entries, failures)
    }

    pub fn entry(&self, id: &str) -> Option<Result<IndexEntry>> {
        if is_reserved(id) {
            return None;
        }
        self.index.get(id).map(|value| {
            serde_json::from_value(value.clone()).map_err(|e| {
                OxError::corrupt(
                    &self.index_file,
                    CodecError::Malformed(format!("entry {id}: {e}")),
                )
            })
        })
    }

    /// Join an index entry with its payload and vector
    pub fn record(&self, entry: IndexEntry) -> Result<Record> {
        let id = entry.id.clone();
        let data = self.payload.get(&id).cloned().ok_or_else(|| OxError::Inconsistent {
            id: id.clone(),
            missing: SubStore::Payload,
        })?;
        let embedding = match self.vectors.get(&id) {
            None => {
                return Err(OxError::Inconsistent {
                    id,
                    missing: SubStore::Vector,
                })
            }
            Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<Vec<f32>>(value.clone()).map_err(
                |e| OxError::Internal(format!("vector of {id} is not a number list: {e}")),
            )?),
        };

        Ok(Record {
            id,
            entry,
            data,
            embedding,
            score: None,
        })
    }
}
