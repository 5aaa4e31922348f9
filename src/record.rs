//! Record types shared by the partition store and the query engine

use crate::error::OxError;
use crate::ident::{CalendarDate, ClockTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata stored in the index file for every record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub key: String,
    pub partition: String,
    pub insertion_time: ClockTime,
    pub insertion_date: CalendarDate,
    pub embedder_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ordinal: u64,
}

/// Logical record: index entry, payload and vector joined by identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub entry: IndexEntry,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Similarity to the query, set by search only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Payload plus optional settings for an insert
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub data: Value,
    pub embedding: Option<Vec<f32>>,
    pub key: Option<String>,
    pub partition: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
}

impl NewEntry {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Lookup filters
///
/// Explicit ids take precedence over fragments; with neither, every record
/// of the partition is selected.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub partition: Option<String>,
    pub ids: Vec<String>,
    pub key: Option<String>,
    pub time: Option<String>,
    pub date: Option<String>,
}

impl Query {
    /// Every record of the current partition
    pub fn all() -> Self {
        Self::default()
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn has_fragments(&self) -> bool {
        self.key.is_some() || self.time.is_some() || self.date.is_some()
    }
}

/// Result of a read operation plus the failures it absorbed
///
/// Read paths never fail outright on a missing or corrupt file; they degrade
/// to whatever could be read and report what went wrong here.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub failures: Vec<OxError>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    pub fn degraded(value: T, failure: OxError) -> Self {
        Self {
            value,
            failures: vec![failure],
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            failures: self.failures,
        }
    }
}

/// Whether a payload counts as "no data"
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
