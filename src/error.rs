//! Unified error types for oxdb
//!
//! Validation errors (`EmptyValue`, `InvalidFormat`, `InvalidPartition`) are
//! raised synchronously. Decode failures become `CorruptStore`; read paths
//! report them through [`crate::record::Outcome`] and write paths propagate
//! them. A write that stops between the three stores of a partition surfaces
//! as `PartialWrite`.

use crate::codec::CodecError;
use crate::ident::ParseIdError;
use crate::partition::SubStore;
use crate::storage::StorageError;

/// Main error type for oxdb operations
#[derive(Debug, thiserror::Error)]
pub enum OxError {
    /// Insert/update called without a payload
    #[error("Empty value: no data given")]
    EmptyValue,

    /// Unsupported or conflicting partition encoding
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Partition name that cannot be used as a directory name
    #[error("Invalid partition name: {0:?}")]
    InvalidPartition(String),

    /// Time or date fragment that cannot be parsed
    #[error("Invalid query fragment: {0}")]
    InvalidFragment(#[from] ParseIdError),

    /// Existing partition file that fails to decode
    #[error("Corrupt store {file}: {source}")]
    CorruptStore {
        file: String,
        #[source]
        source: CodecError,
    },

    /// Identifier absent from the partition
    #[error("Identifier not found in {partition}: {id}")]
    NotFound { partition: String, id: String },

    /// Write that completed for some stores of a record but not the rest
    #[error("Partial write of {id}: {failed} failed after {written:?} were written")]
    PartialWrite {
        id: String,
        written: Vec<SubStore>,
        failed: SubStore,
        #[source]
        source: Box<OxError>,
    },

    /// Record present in the index but missing from another store
    #[error("Inconsistent record {id}: missing from {missing} store")]
    Inconsistent { id: String, missing: SubStore },

    /// Vector dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedder failure
    #[error("Embedder error: {0}")]
    Embedder(String),

    /// Storage layer errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for oxdb operations
pub type Result<T> = std::result::Result<T, OxError>;

impl OxError {
    /// Create a corrupt-store error for a partition file
    pub fn corrupt(file: impl Into<String>, source: CodecError) -> Self {
        Self::CorruptStore {
            file: file.into(),
            source,
        }
    }

    /// Create a not-found error
    pub fn not_found(partition: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            partition: partition.into(),
            id: id.into(),
        }
    }

    /// Create an embedder error
    pub fn embedder(msg: impl Into<String>) -> Self {
        Self::Embedder(msg.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Whether the error came from decoding an existing file
    pub fn is_corruption(&self) -> bool {
        match self {
            OxError::CorruptStore { .. } => true,
            OxError::PartialWrite { source, .. } => source.is_corruption(),
            _ => false,
        }
    }
}
