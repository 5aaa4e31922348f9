//! Structured-text format: the mapping as a pretty-printed JSON object

use super::{CodecError, Mapping};
use serde_json::Value;

pub fn encode(mapping: &Mapping) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec_pretty(mapping).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decode a JSON document; empty or whitespace-only input is an empty mapping
pub fn decode(data: &[u8]) -> Result<Mapping, CodecError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Mapping::new());
    }

    let value: Value =
        serde_json::from_slice(data).map_err(|e| CodecError::Malformed(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(CodecError::NotAMapping),
    }
}
