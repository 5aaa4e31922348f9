//! # oxdb
//!
//! An embedded, file-backed document log: keyed entries grouped into
//! partitions, each partition stored as three parallel files holding the
//! index, the raw payloads and the embedding vectors.
//!
//! ## Architecture
//!
//! ```text
//! DocLog (insert / lookup / update / search)
//!     │
//!     ├── Identifier (ordinal-key-partition-time-date-rand)
//!     ├── SegmentQuery (time > date > key fragment matching)
//!     ├── Embedder (encode + similarity, higher is closer)
//!     │
//!     ▼
//! PartitionStore (per partition, under one mutex)
//!     ├── index    id -> IndexEntry, entry_count
//!     ├── payload  id -> data
//!     └── vector   id -> embedding | null
//!     │
//!     ▼
//! DocFormat (checksummed binary or pretty JSON) -> BlockStorage (files)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxdb::{Config, DocLog, NewEntry, Query};
//!
//! let log = DocLog::open(Config::named("notes")?)?;
//! let id = log.insert(NewEntry::new("buy milk").key("todo"))?;
//! let today = log.lookup(&Query::all().date("04_06_2024"));
//! let ranked = log.search(&"groceries".into(), 5, &Query::all(), false)?;
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod embedder;
pub mod error;
pub mod ident;
pub mod log;
pub mod matcher;
pub mod partition;
pub mod record;
pub mod storage;

pub use codec::{DocFormat, Mapping};
pub use config::{Config, EmbedderConfig};
pub use embedder::{Embedder, HashingEmbedder, Metric};
pub use error::{OxError, Result};
pub use ident::Identifier;
pub use log::DocLog;
pub use record::{IndexEntry, NewEntry, Outcome, Query, Record};
