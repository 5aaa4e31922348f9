//! Embedders
//!
//! The store never interprets vectors itself: it asks an [`Embedder`] to
//! encode payloads and to score pairs of vectors. Scores follow one
//! contract for every embedder, higher means more similar, and search
//! sorts by descending score.

use crate::error::{OxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Maps payloads to fixed-size vectors and scores vector pairs
pub trait Embedder: Send + Sync {
    /// Name and version recorded with every vector this embedder produces
    fn id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn encode(&self, value: &Value) -> Result<Vec<f32>>;

    /// Similarity of two vectors of equal length; higher is closer
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Scoring function, always oriented so that higher is closer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    /// Negated Euclidean distance
    Euclidean,
}

impl Metric {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Dot => dot(a, b),
            Metric::Euclidean => -euclidean_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Cosine => "cosine",
            Metric::Dot => "dot",
            Metric::Euclidean => "euclidean",
        })
    }
}

impl FromStr for Metric {
    type Err = OxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Ok(Metric::Cosine),
            "dot" | "inner" => Ok(Metric::Dot),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(OxError::embedder(format!("unknown metric {other:?}"))),
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors; 0.0 when either is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// Reject vectors that cannot be stored as a number list
pub fn ensure_finite(vector: &[f32]) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(OxError::embedder(format!(
            "vector component {i} is {}, not a finite number",
            vector[i]
        ))),
        None => Ok(()),
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Deterministic bag-of-tokens embedder
///
/// Lowercased alphanumeric tokens are hashed with CRC32 into `dims` signed
/// buckets and the result is L2-normalized. Needs no model and gives the
/// same vector for the same text on every platform.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    id: String,
    dims: usize,
    metric: Metric,
}

impl HashingEmbedder {
    pub fn new(dims: usize, metric: Metric) -> Self {
        let dims = dims.max(1);
        Self {
            id: format!("hashing-v1/{dims}"),
            dims,
            metric,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_EMBED_DIMS, Metric::Cosine)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn encode(&self, value: &Value) -> Result<Vec<f32>> {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut vector = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = crc32fast::hash(token.to_lowercase().as_bytes());
            let bucket = hash as usize % self.dims;
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        Ok(vector)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        self.metric.score(a, b)
    }
}
