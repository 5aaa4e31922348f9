//! Partition file codecs
//!
//! Every partition file holds a single mapping from identifier to value,
//! decoded and encoded in one pass. Two interchangeable formats exist:
//!
//! - [`DocFormat::Binary`]: compact checksummed binary document (`.bin`)
//! - [`DocFormat::Json`]: pretty-printed JSON (`.json`)
//!
//! An empty byte stream decodes to an empty mapping in both formats.

pub mod binary;
pub mod text;

use crate::error::OxError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whole-file content of a partition store
pub type Mapping = BTreeMap<String, Value>;

/// On-disk encoding of a partition, fixed when the partition is created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    #[default]
    Binary,
    Json,
}

impl DocFormat {
    pub const ALL: [DocFormat; 2] = [DocFormat::Binary, DocFormat::Json];

    /// File extension shared by the three files of a partition
    pub fn extension(&self) -> &'static str {
        match self {
            DocFormat::Binary => "bin",
            DocFormat::Json => "json",
        }
    }

    pub fn encode(&self, mapping: &Mapping) -> Result<Vec<u8>, CodecError> {
        match self {
            DocFormat::Binary => binary::encode(mapping),
            DocFormat::Json => text::encode(mapping),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Mapping, CodecError> {
        match self {
            DocFormat::Binary => binary::decode(bytes),
            DocFormat::Json => text::decode(bytes),
        }
    }
}

impl fmt::Display for DocFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocFormat {
    type Err = OxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bin" | "binary" | "bson" => Ok(DocFormat::Binary),
            "json" | "text" => Ok(DocFormat::Json),
            other => Err(OxError::InvalidFormat(other.to_string())),
        }
    }
}

/// Decode/encode failures of a partition file
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Truncated document")]
    Truncated,

    #[error("Invalid document magic number")]
    InvalidMagic,

    #[error("Unsupported document version {0}")]
    UnsupportedVersion(u32),

    #[error("Body length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("CRC checksum mismatch")]
    ChecksumMismatch,

    #[error("Document root is not a mapping")]
    NotAMapping,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Mapping {
        let mut m = Mapping::new();
        m.insert("__init__".into(), json!("doc.index"));
        m.insert("entry_count".into(), json!(3));
        m.insert(
            "0-key-doc-10:30:00_AM-04_06_2024-a1B2".into(),
            json!({
                "text": "hello",
                "nested": {"list": [1, -2, 3.5, null, true], "empty": {}},
                "vector": [0.25, -0.5, 1e-7],
            }),
        );
        m.insert("null".into(), Value::Null);
        m
    }

    #[test]
    fn test_both_formats_roundtrip() {
        for format in DocFormat::ALL {
            let m = sample();
            let bytes = format.encode(&m).unwrap();
            assert_eq!(format.decode(&bytes).unwrap(), m, "format {format}");

            let empty = Mapping::new();
            let bytes = format.encode(&empty).unwrap();
            assert_eq!(format.decode(&bytes).unwrap(), empty, "format {format}");
        }
    }

    #[test]
    fn test_random_floats_roundtrip_exactly() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x0dd5);

        let mut m = Mapping::new();
        let mut i = 0;
        while m.len() < 5_000 {
            let f = f64::from_bits(rng.gen::<u64>());
            if !f.is_finite() {
                continue;
            }
            m.insert(format!("f{i}"), json!(f));
            m.insert(format!("v{i}"), json!([rng.gen::<f32>() * 2.0 - 1.0, f as f32]));
            i += 1;
        }

        for format in DocFormat::ALL {
            let decoded = format.decode(&format.encode(&m).unwrap()).unwrap();
            for (key, value) in &m {
                assert_eq!(decoded.get(key), Some(value), "format {format}, key {key}");
            }
        }
    }

    #[test]
    fn test_empty_bytes_decode_to_empty_mapping() {
        for format in DocFormat::ALL {
            assert!(format.decode(&[]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("bson".parse::<DocFormat>().unwrap(), DocFormat::Binary);
        assert_eq!(" JSON ".parse::<DocFormat>().unwrap(), DocFormat::Json);
        assert!(matches!(
            "xml".parse::<DocFormat>(),
            Err(OxError::InvalidFormat(f)) if f == "xml"
        ));
    }
}
