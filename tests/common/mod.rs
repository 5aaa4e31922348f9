//! Shared test utilities for oxdb testing
//!
//! This module provides:
//! - Temporary databases with a fixed clock
//! - Failing storage wrapper for error injection
//! - A table-driven embedder with scripted vectors
//! - Seeded vector generation

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::Value;
use tempfile::TempDir;

use oxdb::clock::ManualClock;
use oxdb::storage::{BlockStorage, FileStorage, FileStorageConfig, StorageError, StorageResult};
use oxdb::{Config, DocFormat, DocLog, Embedder, HashingEmbedder, Metric, OxError};

static TRACING: Once = Once::new();

/// Install a test subscriber honoring RUST_LOG, once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Helper to create io::Error for injection
fn io_error(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, msg)
}

/// Generate a deterministic vector based on seed
pub fn seeded_vector(dims: usize, seed: u64) -> Vec<f32> {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let v: Vec<f32> = (0..dims).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    normalize(&v)
}

/// Normalize a vector to unit length
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// 4 June 2024 at the given 24-hour time
pub fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 4)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .unwrap()
}

/// Everything a test needs to poke at a database
pub struct TestLog {
    pub temp_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<FailingStorage>,
    pub log: DocLog,
}

impl TestLog {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Temporary database with the hashing embedder and a clock at 10:30:00 AM
pub fn temp_log(format: DocFormat) -> TestLog {
    temp_log_with(format, Arc::new(HashingEmbedder::new(64, Metric::Cosine)))
}

/// Temporary database with a custom embedder
pub fn temp_log_with(format: DocFormat, embedder: Arc<dyn Embedder>) -> TestLog {
    init_tracing();

    let temp_dir = tempfile::tempdir().unwrap();
    let inner = Arc::new(FileStorage::new(temp_dir.path(), FileStorageConfig::fast()).unwrap());
    let storage = Arc::new(FailingStorage::new(inner));
    let clock = Arc::new(ManualClock::new(at(10, 30, 0)));

    let config = Config::new(temp_dir.path())
        .with_format(format)
        .with_default_partition("notes")
        .with_storage(FileStorageConfig::fast());
    let log = DocLog::with_parts(config, storage.clone(), embedder, clock.clone());

    TestLog {
        temp_dir,
        clock,
        storage,
        log,
    }
}

/// Reopen a database directory as a fresh `DocLog`
pub fn reopen(path: &Path, format: DocFormat) -> DocLog {
    let config = Config::new(path)
        .with_format(format)
        .with_default_partition("notes")
        .with_storage(FileStorageConfig::fast());
    DocLog::with_embedder(config, Arc::new(HashingEmbedder::new(64, Metric::Cosine))).unwrap()
}

/// Failure injection mode for FailingStorage
#[derive(Clone, Debug, PartialEq)]
pub enum FailureMode {
    /// No failures
    None,
    /// Fail all operations
    FailAll,
    /// Fail after N operations
    FailAfterN(u64),
    /// Fail only write operations
    FailWrites,
    /// Fail writes to paths containing the given text
    FailWritesTo(String),
    /// Simulate partial write (truncate data)
    PartialWrite(usize),
}

/// Storage wrapper that can inject failures for testing
pub struct FailingStorage {
    inner: Arc<dyn BlockStorage>,
    failure_mode: RwLock<FailureMode>,
    operation_count: AtomicU64,
    enabled: AtomicBool,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn BlockStorage>) -> Self {
        Self {
            inner,
            failure_mode: RwLock::new(FailureMode::None),
            operation_count: AtomicU64::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    /// Set the failure mode
    pub fn set_failure_mode(&self, mode: FailureMode) {
        self.enabled.store(mode != FailureMode::None, Ordering::SeqCst);
        *self.failure_mode.write() = mode;
        self.operation_count.store(0, Ordering::SeqCst);
    }

    /// Disable all failures
    pub fn disable_failures(&self) {
        self.set_failure_mode(FailureMode::None);
    }

    /// Check if should fail this operation
    fn should_fail(&self, op_type: &str, path: &str) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }

        let count = self.operation_count.fetch_add(1, Ordering::SeqCst);
        match &*self.failure_mode.read() {
            FailureMode::None => false,
            FailureMode::FailAll => true,
            FailureMode::FailAfterN(n) => count >= *n,
            FailureMode::FailWrites => op_type == "write",
            FailureMode::FailWritesTo(part) => op_type == "write" && path.contains(part.as_str()),
            FailureMode::PartialWrite(_) => false, // Handled specially
        }
    }

    /// Get current operation count
    pub fn operation_count(&self) -> u64 {
        self.operation_count.load(Ordering::SeqCst)
    }
}

impl BlockStorage for FailingStorage {
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        if self.should_fail("write", path) {
            return Err(StorageError::Io(io_error("Injected write failure")));
        }

        // Handle partial write
        if let FailureMode::PartialWrite(max_bytes) = *self.failure_mode.read() {
            if data.len() > max_bytes {
                return self.inner.write(path, &data[..max_bytes]);
            }
        }

        self.inner.write(path, data)
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        if self.should_fail("read", path) {
            return Err(StorageError::Io(io_error("Injected read failure")));
        }
        self.inner.read(path)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        self.inner.exists(path)
    }

    fn sync(&self, path: &str) -> StorageResult<()> {
        if self.should_fail("sync", path) {
            return Err(StorageError::Io(io_error("Injected sync failure")));
        }
        self.inner.sync(path)
    }

    fn create_dir(&self, path: &str) -> StorageResult<()> {
        self.inner.create_dir(path)
    }

    fn list_dirs(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list_dirs(prefix)
    }

    fn root_path(&self) -> &Path {
        self.inner.root_path()
    }
}

/// Embedder returning scripted vectors for known texts
///
/// Unknown texts fail to encode. Similarity is cosine.
pub struct TableEmbedder {
    dims: usize,
    table: Mutex<HashMap<String, Vec<f32>>>,
}

impl TableEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.set(text, vector);
        self
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        assert_eq!(vector.len(), self.dims);
        self.table.lock().insert(text.to_string(), vector);
    }
}

impl Embedder for TableEmbedder {
    fn id(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn encode(&self, value: &Value) -> oxdb::Result<Vec<f32>> {
        let text = value.as_str().unwrap_or_default();
        self.table
            .lock()
            .get(text)
            .cloned()
            .ok_or_else(|| OxError::embedder(format!("no vector scripted for {text:?}")))
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        oxdb::embedder::cosine_similarity(a, b)
    }
}

/// Unit vector in the plane at `angle` radians from the x axis
pub fn planar(dims: usize, angle: f32) -> Vec<f32> {
    let mut v = vec![0.0; dims];
    v[0] = angle.cos();
    v[1] = angle.sin();
    v
}
