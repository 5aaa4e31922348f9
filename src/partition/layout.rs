//! File naming for a partition directory

use crate::codec::DocFormat;
use crate::defaults::{INDEX_SUFFIX, VECTOR_SUFFIX};
use crate::error::{OxError, Result};
use crate::storage::BlockStorage;
use std::fmt;

/// One of the three files of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubStore {
    Index,
    Payload,
    Vector,
}

impl SubStore {
    /// Write order of a record
    pub const ALL: [SubStore; 3] = [SubStore::Index, SubStore::Payload, SubStore::Vector];
}

impl fmt::Display for SubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubStore::Index => "index",
            SubStore::Payload => "payload",
            SubStore::Vector => "vector",
        })
    }
}

/// Paths of the three files of one partition, relative to the database root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    pub name: String,
    pub format: DocFormat,
}

impl PartitionLayout {
    pub fn new(name: impl Into<String>, format: DocFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }

    /// File name without the format extension; also the sentinel value
    pub fn file_key(&self, store: SubStore) -> String {
        match store {
            SubStore::Index => format!("{}{}", self.name, INDEX_SUFFIX),
            SubStore::Payload => self.name.clone(),
            SubStore::Vector => format!("{}{}", self.name, VECTOR_SUFFIX),
        }
    }

    pub fn path(&self, store: SubStore) -> String {
        format!(
            "{}/{}.{}",
            self.name,
            self.file_key(store),
            self.format.extension()
        )
    }
}

/// Reject names that cannot be used as a single directory component
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || name.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(OxError::InvalidPartition(name.to_string()));
    }
    Ok(())
}

/// Format of an existing partition, found by probing for its index file
pub fn detect_format(storage: &dyn BlockStorage, name: &str) -> Result<Option<DocFormat>> {
    for format in DocFormat::ALL {
        let layout = PartitionLayout::new(name, format);
        if storage.exists(&layout.path(SubStore::Index))? {
            return Ok(Some(format));
        }
    }
    Ok(None)
}
