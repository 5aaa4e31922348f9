//! Local filesystem storage
//!
//! Features:
//! - Paths resolved under a single root directory
//! - Parent directories created on demand
//! - Optional fsync after every write

use super::*;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Configuration for filesystem storage behavior
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Call fsync when a file is synced
    pub fsync: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self { fsync: true }
    }
}

impl FileStorageConfig {
    /// Config for fast tests (sync is a no-op)
    pub fn fast() -> Self {
        Self { fsync: false }
    }

    /// Config that fsyncs every synced file
    pub fn durable() -> Self {
        Self::default()
    }
}

/// Filesystem-backed block storage
pub struct FileStorage {
    root: PathBuf,
    config: FileStorageConfig,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, config: FileStorageConfig) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self { root, config })
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlockStorage for FileStorage {
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&full_path)?;
        file.write_all(data)?;

        Ok(())
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.full_path(path);
        match fs::read(&full_path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.full_path(path).exists())
    }

    fn sync(&self, path: &str) -> StorageResult<()> {
        if !self.config.fsync {
            return Ok(());
        }

        let full_path = self.full_path(path);
        let file = OpenOptions::new().write(true).open(&full_path)?;
        file.sync_all()?;

        Ok(())
    }

    fn create_dir(&self, path: &str) -> StorageResult<()> {
        fs::create_dir_all(self.full_path(path))?;
        Ok(())
    }

    fn list_dirs(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let full_path = self.full_path(prefix);
        if !full_path.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&full_path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        dirs.sort();

        Ok(dirs)
    }

    fn root_path(&self) -> &Path {
        &self.root
    }
}
