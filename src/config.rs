//! Configuration module

use crate::codec::DocFormat;
use crate::defaults::{DATED_PARTITION_PREFIX, DB_DIR_SUFFIX, DEFAULT_EMBED_DIMS};
use crate::embedder::{HashingEmbedder, Metric};
use crate::ident::CalendarDate;
use crate::storage::FileStorageConfig;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database directory; every partition lives directly below it
    pub root: PathBuf,
    /// Format of partitions created from now on
    pub format: DocFormat,
    /// Partition used when a call names none
    pub default_partition: String,
    pub embedder: EmbedderConfig,
    pub storage: FileStorageConfig,
}

impl Config {
    /// Database at an explicit path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: DocFormat::default(),
            default_partition: dated_partition(&Local::now().naive_local()),
            embedder: EmbedderConfig::default(),
            storage: FileStorageConfig::default(),
        }
    }

    /// Database named `db`, stored at `~/<db>.ox-db`
    pub fn named(db: &str) -> anyhow::Result<Self> {
        let db = db.trim();
        if db.is_empty() || db.contains(['/', '\\']) {
            anyhow::bail!("Invalid database name: {db:?}");
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot resolve home directory"))?;
        Ok(Self::new(home.join(format!("{db}{DB_DIR_SUFFIX}"))))
    }

    /// Load config from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("OXDB_ROOT") {
            Ok(root) => Self::new(root),
            Err(_) => Self::named(
                &std::env::var("OXDB_NAME").unwrap_or_else(|_| "oxdb".to_string()),
            )?,
        };

        if let Ok(format) = std::env::var("OXDB_FORMAT") {
            config.format = format
                .parse()
                .map_err(|e| anyhow::anyhow!("OXDB_FORMAT: {e}"))?;
        }
        if let Ok(partition) = std::env::var("OXDB_PARTITION") {
            config.default_partition = partition;
        }
        if let Ok(dims) = std::env::var("OXDB_EMBED_DIMS") {
            config.embedder.dims = match dims.parse::<usize>() {
                Ok(d) if d > 0 => d,
                _ => anyhow::bail!("OXDB_EMBED_DIMS must be a positive integer, got {dims:?}"),
            };
        }
        if let Ok(metric) = std::env::var("OXDB_EMBED_METRIC") {
            config.embedder.metric = metric
                .parse()
                .map_err(|e| anyhow::anyhow!("OXDB_EMBED_METRIC: {e}"))?;
        }
        config.storage.fsync = std::env::var("OXDB_FSYNC")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(config)
    }

    pub fn with_format(mut self, format: DocFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_partition(mut self, partition: impl Into<String>) -> Self {
        self.default_partition = partition.into();
        self
    }

    pub fn with_embedder(mut self, embedder: EmbedderConfig) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_storage(mut self, storage: FileStorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

/// Default partition name for a given day (`log_04062024`)
pub fn dated_partition(at: &NaiveDateTime) -> String {
    format!(
        "{DATED_PARTITION_PREFIX}{}",
        CalendarDate::from_datetime(at).compact()
    )
}

/// Built-in embedder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedderConfig {
    pub dims: usize,
    pub metric: Metric,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            dims: DEFAULT_EMBED_DIMS,
            metric: Metric::Cosine,
        }
    }
}

impl EmbedderConfig {
    pub fn build(&self) -> HashingEmbedder {
        HashingEmbedder::new(self.dims, self.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use chrono::NaiveDate;

    #[test]
    fn test_dated_partition() {
        let at = NaiveDate::from_ymd_opt(2024, 6, 4)
            .and_then(|d| d.and_hms_opt(23, 59, 0))
            .unwrap();
        assert_eq!(dated_partition(&at), "log_04062024");
    }

    #[test]
    fn test_builders() {
        let config = Config::new("/tmp/db")
            .with_format(DocFormat::Json)
            .with_default_partition("journal")
            .with_embedder(EmbedderConfig {
                dims: 32,
                metric: Metric::Dot,
            });

        assert_eq!(config.root, PathBuf::from("/tmp/db"));
        assert_eq!(config.format, DocFormat::Json);
        assert_eq!(config.default_partition, "journal");
        assert_eq!(config.embedder.build().dimensions(), 32);
    }

    #[test]
    fn test_new_uses_dated_default_partition() {
        let config = Config::new("/tmp/db");
        assert!(config.default_partition.starts_with(DATED_PARTITION_PREFIX));
        assert_eq!(config.default_partition.len(), DATED_PARTITION_PREFIX.len() + 8);
        assert!(config.storage.fsync);
    }

    #[test]
    fn test_named_rejects_paths() {
        assert!(Config::named("").is_err());
        assert!(Config::named("a/b").is_err());
    }
}
