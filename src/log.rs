//! Document log
//!
//! Top-level query engine. Resolves partitions, generates identifiers and
//! composes the partition store, the segment matcher and the embedder into
//! insert, lookup, update and search.
//!
//! Every operation on a partition runs under that partition's mutex, so one
//! `DocLog` shared through `Arc` never loses updates. Separate `DocLog`
//! instances or processes writing the same root are not coordinated.

use crate::clock::{Clock, SystemClock};
use crate::codec::DocFormat;
use crate::config::Config;
use crate::defaults::{CALLER_SUPPLIED_EMBEDDER, DEFAULT_KEY};
use crate::embedder::{ensure_finite, Embedder};
use crate::error::{OxError, Result};
use crate::ident::Identifier;
use crate::matcher::{match_segments, SegmentQuery};
use crate::partition::{detect_format, is_reserved, validate_name, PartitionStore, SubStore};
use crate::record::{is_empty_value, IndexEntry, NewEntry, Outcome, Query, Record};
use crate::storage::{BlockStorage, FileStorage, StorageError};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// An opened partition plus the lock serializing its operations
struct Partition {
    store: PartitionStore,
    lock: Mutex<()>,
}

/// Embedded document log over one database root
pub struct DocLog {
    config: Config,
    storage: Arc<dyn BlockStorage>,
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    current: RwLock<String>,
    partitions: DashMap<String, Arc<Partition>>,
    /// Serializes first-time opening of partitions
    open_lock: Mutex<()>,
}

impl DocLog {
    /// Open the database at `config.root` with the built-in embedder
    pub fn open(config: Config) -> Result<Self> {
        let embedder = Arc::new(config.embedder.build());
        Self::with_embedder(config, embedder)
    }

    /// Open the database at `config.root` with a custom embedder
    pub fn with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let storage = FileStorage::new(&config.root, config.storage.clone())
            .map_err(StorageError::Io)?;
        Ok(Self::with_parts(
            config,
            Arc::new(storage),
            embedder,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble from explicit collaborators
    pub fn with_parts(
        config: Config,
        storage: Arc<dyn BlockStorage>,
        embedder: Arc<dyn Embedder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::debug!(
            root = %storage.root_path().display(),
            partition = %config.default_partition,
            embedder = embedder.id(),
            "opened document log"
        );

        Self {
            current: RwLock::new(config.default_partition.clone()),
            config,
            storage,
            embedder,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            partitions: DashMap::new(),
            open_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Database directory
    pub fn root(&self) -> &Path {
        self.storage.root_path()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Partition used when a call names none
    pub fn current_partition(&self) -> String {
        self.current.read().clone()
    }

    /// Switch the current partition, creating it if needed
    ///
    /// `format` only applies to a new partition; naming a different format
    /// for an existing one fails with [`OxError::InvalidFormat`].
    pub fn select_partition(&self, name: &str, format: Option<DocFormat>) -> Result<()> {
        validate_name(name)?;

        if let (Some(existing), Some(wanted)) =
            (detect_format(self.storage.as_ref(), name)?, format)
        {
            if existing != wanted {
                return Err(OxError::InvalidFormat(format!(
                    "partition {name} is stored as {existing}, not {wanted}"
                )));
            }
        }

        self.partition_with(name, format)?;
        *self.current.write() = name.to_string();
        tracing::info!(partition = name, "selected partition");

        Ok(())
    }

    /// Names of all partitions under the root
    pub fn partitions(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir in self.storage.list_dirs("")? {
            if validate_name(&dir).is_ok() && detect_format(self.storage.as_ref(), &dir)?.is_some() {
                names.push(dir);
            }
        }
        Ok(names)
    }

    /// Number of records ever inserted into a partition
    pub fn entry_count(&self, partition: Option<&str>) -> Result<u64> {
        let partition = self.partition(partition)?;
        let _guard = partition.lock.lock();
        partition.store.entry_count()
    }

    /// Store a new record and return its identifier
    pub fn insert(&self, entry: NewEntry) -> Result<String> {
        if is_empty_value(&entry.data) {
            return Err(OxError::EmptyValue);
        }

        let partition = self.partition(entry.partition.as_deref())?;
        let (vector, embedder_id) = self.embed(&entry.data, entry.embedding)?;
        let key = entry
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_KEY);

        let _guard = partition.lock.lock();
        let name = partition.store.name();
        let at = self.clock.now();

        let stored = partition.store.append(&entry.data, vector.as_deref(), |ordinal| {
            let id = Identifier::generate(ordinal, Some(key), Some(name), &at, &mut *self.rng.lock());
            IndexEntry {
                id: id.to_string(),
                key: key.to_string(),
                partition: name.to_string(),
                insertion_time: id.time,
                insertion_date: id.date,
                embedder_id: embedder_id.clone(),
                description: entry.description.clone(),
                tags: entry.tags.clone(),
                ordinal,
            }
        })?;

        tracing::info!(partition = name, id = %stored.id, key, "logged data");
        Ok(stored.id)
    }

    /// Records selected by `query`
    ///
    /// Explicit ids take precedence and unknown ids are skipped; otherwise
    /// fragments go through the segment matcher; with neither, every record
    /// is returned. Unreadable files degrade to an empty result.
    pub fn lookup(&self, query: &Query) -> Outcome<Vec<Record>> {
        let partition = match self.partition(query.partition.as_deref()) {
            Ok(p) => p,
            Err(e) => return degraded(Vec::new(), e),
        };
        let snapshot = {
            let _guard = partition.lock.lock();
            match partition.store.snapshot() {
                Ok(s) => s,
                Err(e) => return degraded(Vec::new(), e),
            }
        };

        let mut failures = Vec::new();
        let entries: Vec<IndexEntry> = if !query.ids.is_empty() {
            query
                .ids
                .iter()
                .filter_map(|id| match snapshot.entry(id)? {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        failures.push(e);
                        None
                    }
                })
                .collect()
        } else {
            let (mut entries, errors) = snapshot.entries();
            failures.extend(errors);
            entries.sort_by_key(|e| e.ordinal);

            if query.has_fragments() {
                let segments = match SegmentQuery::parse(
                    query.key.as_deref(),
                    query.time.as_deref(),
                    query.date.as_deref(),
                ) {
                    Ok(s) => s,
                    Err(e) => return degraded(Vec::new(), e.into()),
                };
                let matched: HashSet<String> = match_segments(&entries, &segments)
                    .into_iter()
                    .map(|m| m.id)
                    .collect();
                entries.retain(|e| matched.contains(&e.id));
            }
            entries
        };

        let records = entries
            .into_iter()
            .filter_map(|entry| match snapshot.record(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(partition = partition.store.name(), error = %e, "skipping record");
                    failures.push(e);
                    None
                }
            })
            .collect();

        Outcome {
            value: records,
            failures,
        }
    }

    /// Replace payload and vector of an existing record
    ///
    /// Fails with [`OxError::NotFound`] when `id` is not in the partition.
    pub fn update(
        &self,
        id: &str,
        data: impl Into<Value>,
        embedding: Option<Vec<f32>>,
        partition: Option<&str>,
    ) -> Result<()> {
        let data = data.into();
        if is_empty_value(&data) {
            return Err(OxError::EmptyValue);
        }

        let partition = self.partition(partition)?;
        let (vector, embedder_id) = self.embed(&data, embedding)?;

        let _guard = partition.lock.lock();
        let mut entry = partition.store.entry(id)?;
        entry.embedder_id = embedder_id;
        partition
            .store
            .overwrite(id, &entry, &data, vector.as_deref())?;

        tracing::info!(partition = partition.store.name(), id, "updated data");
        Ok(())
    }

    /// Rank the records selected by `filter` against `query`, most similar first
    ///
    /// Records without a stored vector are embedded on the fly; those vectors
    /// are not written back.
    pub fn search(
        &self,
        query: &Value,
        top_n: usize,
        filter: &Query,
        include_embeddings: bool,
    ) -> Result<Outcome<Vec<Record>>> {
        let query_vector = self.embedder.encode(query)?;
        let Outcome {
            value: candidates,
            mut failures,
        } = self.lookup(filter);

        let mut scored = Vec::with_capacity(candidates.len());
        for mut record in candidates {
            let vector = match record.embedding.take() {
                Some(v) => v,
                None => match self.embedder.encode(&record.data) {
                    Ok(v) => v,
                    Err(e) => {
                        failures.push(e);
                        continue;
                    }
                },
            };
            if vector.len() != query_vector.len() {
                tracing::warn!(id = %record.id, dims = vector.len(), "skipping vector of other dimension");
                failures.push(OxError::dimension_mismatch(query_vector.len(), vector.len()));
                continue;
            }

            record.score = Some(self.embedder.similarity(&query_vector, &vector));
            if include_embeddings {
                record.embedding = Some(vector);
            }
            scored.push(record);
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_n);

        Ok(Outcome {
            value: scored,
            failures,
        })
    }

    /// Compute every missing vector of a partition and store it
    ///
    /// Returns how many vectors were filled.
    pub fn embed_all(&self, partition: Option<&str>) -> Outcome<usize> {
        let partition = match self.partition(partition) {
            Ok(p) => p,
            Err(e) => return degraded(0, e),
        };

        let _guard = partition.lock.lock();
        let snapshot = match partition.store.snapshot() {
            Ok(s) => s,
            Err(e) => return degraded(0, e),
        };

        let mut failures = Vec::new();
        let mut filled = Vec::new();
        for (id, _) in snapshot
            .vectors
            .iter()
            .filter(|(id, v)| !is_reserved(id) && v.is_null())
        {
            let Some(data) = snapshot.payload.get(id) else {
                failures.push(OxError::Inconsistent {
                    id: id.clone(),
                    missing: SubStore::Payload,
                });
                continue;
            };
            match self
                .embedder
                .encode(data)
                .and_then(|v| ensure_finite(&v).map(|()| v))
            {
                Ok(vector) => filled.push((id.clone(), vector)),
                Err(e) => failures.push(e),
            }
        }

        if let Err(e) = partition.store.put_vectors(&filled) {
            failures.push(e);
            return Outcome {
                value: 0,
                failures,
            };
        }

        tracing::info!(partition = partition.store.name(), filled = filled.len(), "embedded records");
        Outcome {
            value: filled.len(),
            failures,
        }
    }

    /// Identifiers whose vectors came from a different embedder than the active one
    pub fn incompatible_embeddings(&self, partition: Option<&str>) -> Outcome<Vec<String>> {
        let partition = match self.partition(partition) {
            Ok(p) => p,
            Err(e) => return degraded(Vec::new(), e),
        };
        let snapshot = {
            let _guard = partition.lock.lock();
            match partition.store.snapshot() {
                Ok(s) => s,
                Err(e) => return degraded(Vec::new(), e),
            }
        };

        let (mut entries, failures) = snapshot.entries();
        entries.sort_by_key(|e| e.ordinal);
        let ids = entries
            .into_iter()
            .filter(|e| e.embedder_id != self.embedder.id())
            .map(|e| e.id)
            .collect();

        Outcome {
            value: ids,
            failures,
        }
    }

    /// Vector and embedder id for a payload
    ///
    /// A caller-supplied vector with NaN or infinite components is rejected.
    /// An embedder failure leaves the vector empty; it is filled later by
    /// search or [`DocLog::embed_all`].
    fn embed(&self, data: &Value, supplied: Option<Vec<f32>>) -> Result<(Option<Vec<f32>>, String)> {
        if let Some(vector) = supplied {
            ensure_finite(&vector)?;
            return Ok((Some(vector), CALLER_SUPPLIED_EMBEDDER.to_string()));
        }

        let vector = match self
            .embedder
            .encode(data)
            .and_then(|v| ensure_finite(&v).map(|()| v))
        {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(embedder = self.embedder.id(), error = %e, "storing record without vector");
                None
            }
        };
        Ok((vector, self.embedder.id().to_string()))
    }

    fn partition(&self, name: Option<&str>) -> Result<Arc<Partition>> {
        match name {
            Some(name) => self.partition_with(name, None),
            None => {
                let current = self.current_partition();
                self.partition_with(&current, None)
            }
        }
    }

    /// Get or open a partition; `format` is used only when creating it
    fn partition_with(&self, name: &str, format: Option<DocFormat>) -> Result<Arc<Partition>> {
        if let Some(partition) = self.partitions.get(name) {
            return Ok(partition.clone());
        }

        let _guard = self.open_lock.lock();
        if let Some(partition) = self.partitions.get(name) {
            return Ok(partition.clone());
        }

        let format = detect_format(self.storage.as_ref(), name)?
            .or(format)
            .unwrap_or(self.config.format);
        let partition = Arc::new(Partition {
            store: PartitionStore::open(self.storage.clone(), name, format)?,
            lock: Mutex::new(()),
        });
        self.partitions.insert(name.to_string(), partition.clone());
        tracing::debug!(partition = name, %format, "opened partition");

        Ok(partition)
    }
}

fn degraded<T>(value: T, error: OxError) -> Outcome<T> {
    tracing::warn!(error = %error, "read degraded");
    Outcome::degraded(value, error)
}
