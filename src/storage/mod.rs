//! Storage abstraction layer
//!
//! Partition files are addressed by paths relative to the database root and
//! always written whole: a write truncates the file and replaces its entire
//! content. Nothing in this layer locks files.

pub mod file;

use std::path::Path;

pub use file::{FileStorage, FileStorageConfig};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Block storage trait
///
/// A directory tree of small files with:
/// - Whole-file overwrite
/// - fsync for durability
/// - Directory creation and listing
pub trait BlockStorage: Send + Sync + 'static {
    /// Replace the content of a file (relative to storage root), creating it if needed
    /// Does NOT guarantee durability until sync() is called
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Read entire file
    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Check if file exists
    fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Sync file to durable storage (fsync)
    fn sync(&self, path: &str) -> StorageResult<()>;

    /// Create directory (and parents)
    fn create_dir(&self, path: &str) -> StorageResult<()>;

    /// List the names of sub-directories directly under `prefix`
    fn list_dirs(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Get the root path (for diagnostics)
    fn root_path(&self) -> &Path;
}
