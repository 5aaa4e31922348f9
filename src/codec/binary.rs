//! Binary document format
//!
//! Layout (header little-endian, magic big-endian):
//! ┌──────────┬──────────┬──────────┬──────────┬──────────────────────────┐
//! │ Magic    │ Version  │ CRC32    │ BodyLen  │ Body (bincode entries)   │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │ 8 bytes  │ BodyLen bytes            │
//! └──────────┴──────────┴──────────┴──────────┴──────────────────────────┘
//!
//! The body is the bincode encoding of the mapping as a list of
//! `(key, BinValue)` pairs. `BinValue` mirrors the JSON data model with
//! explicit tags, which keeps the body decodable without a self-describing
//! format.

use super::{CodecError, Mapping};
use crate::defaults::{BINARY_HEADER_SIZE, BINARY_MAGIC, BINARY_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum BinValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Seq(Vec<BinValue>),
    Map(Vec<(String, BinValue)>),
}

impl From<&Value> for BinValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => BinValue::Null,
            Value::Bool(b) => BinValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BinValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    BinValue::UInt(u)
                } else {
                    n.as_f64().map(BinValue::Float).unwrap_or(BinValue::Null)
                }
            }
            Value::String(s) => BinValue::Str(s.clone()),
            Value::Array(items) => BinValue::Seq(items.iter().map(BinValue::from).collect()),
            Value::Object(map) => BinValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), BinValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<BinValue> for Value {
    fn from(value: BinValue) -> Self {
        match value {
            BinValue::Null => Value::Null,
            BinValue::Bool(b) => Value::Bool(b),
            BinValue::Int(i) => Value::from(i),
            BinValue::UInt(u) => Value::from(u),
            BinValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            BinValue::Str(s) => Value::String(s),
            BinValue::Seq(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            BinValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Encode a mapping as a single binary document
pub fn encode(mapping: &Mapping) -> Result<Vec<u8>, CodecError> {
    let entries: Vec<(&str, BinValue)> = mapping
        .iter()
        .map(|(k, v)| (k.as_str(), BinValue::from(v)))
        .collect();
    let body = bincode::serialize(&entries).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let mut buffer = vec![0u8; BINARY_HEADER_SIZE];
    buffer[0..4].copy_from_slice(&BINARY_MAGIC.to_be_bytes());
    buffer[4..8].copy_from_slice(&BINARY_VERSION.to_le_bytes());
    buffer[8..12].copy_from_slice(&crc32fast::hash(&body).to_le_bytes());
    buffer[12..20].copy_from_slice(&(body.len() as u64).to_le_bytes());
    buffer.extend_from_slice(&body);

    Ok(buffer)
}

/// Decode a binary document; zero bytes decode to an empty mapping
pub fn decode(data: &[u8]) -> Result<Mapping, CodecError> {
    if data.is_empty() {
        return Ok(Mapping::new());
    }
    if data.len() < BINARY_HEADER_SIZE {
        return Err(CodecError::Truncated);
    }

    fn to_u32(data: &[u8], start: usize) -> Result<[u8; 4], CodecError> {
        data.get(start..start + 4)
            .ok_or(CodecError::Truncated)?
            .try_into()
            .map_err(|_| CodecError::Truncated)
    }

    let magic = u32::from_be_bytes(to_u32(data, 0)?);
    if magic != BINARY_MAGIC {
        return Err(CodecError::InvalidMagic);
    }

    let version = u32::from_le_bytes(to_u32(data, 4)?);
    if version == 0 || version > BINARY_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let stored_crc = u32::from_le_bytes(to_u32(data, 8)?);
    let body_len = data
        .get(12..20)
        .ok_or(CodecError::Truncated)?
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| CodecError::Truncated)?;

    let body = &data[BINARY_HEADER_SIZE..];
    let actual = body.len() as u64;
    if actual < body_len {
        return Err(CodecError::Truncated);
    }
    if actual > body_len {
        return Err(CodecError::LengthMismatch {
            expected: body_len,
            actual,
        });
    }

    if crc32fast::hash(body) != stored_crc {
        return Err(CodecError::ChecksumMismatch);
    }

    let entries: Vec<(String, BinValue)> =
        bincode::deserialize(body).map_err(|e| CodecError::Malformed(e.to_string()))?;

    Ok(entries
        .into_iter()
        .map(|(k, v)| (k, Value::from(v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Mapping {
        let mut m = Mapping::new();
        m.insert("a".into(), json!({"n": u64::MAX, "neg": -7, "f": 0.1}));
        m.insert("b".into(), json!([[], {}, "", null]));
        m
    }

    #[test]
    fn test_number_kinds_survive() {
        let m = sample();
        let decoded = decode(&encode(&m).unwrap()).unwrap();
        assert_eq!(decoded["a"]["n"].as_u64(), Some(u64::MAX));
        assert_eq!(decoded["a"]["neg"].as_i64(), Some(-7));
        assert_eq!(decoded["a"]["f"].as_f64(), Some(0.1));
        assert_eq!(decoded, m);
    }

    #[test]
    fn test_corruption_detection() {
        let mut bytes = encode(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(matches!(decode(&bytes), Err(CodecError::ChecksumMismatch)));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0..4].copy_from_slice(&0x1234_5678u32.to_be_bytes());

        assert!(matches!(decode(&bytes), Err(CodecError::InvalidMagic)));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode(&sample()).unwrap();

        assert!(matches!(decode(&bytes[..10]), Err(CodecError::Truncated)));
        assert!(matches!(
            decode(&bytes[..bytes.len() - 3]),
            Err(CodecError::Truncated)
        ));
    }

    #[test]
    fn test_trailing_garbage() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.extend_from_slice(b"junk");

        assert!(matches!(
            decode(&bytes),
            Err(CodecError::LengthMismatch { .. })
        ));
    }
}
