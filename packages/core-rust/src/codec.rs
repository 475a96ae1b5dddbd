//! JSON wire codec for request messages and result records.
//!
//! Encoding always produces `camelCase` field names. Decoding is lenient
//! about field naming: keys are matched case-insensitively with `-` and `_`
//! ignored, and a few legacy names are accepted (`profileId` for
//! `subjectId`, `value` for `payload`, `timestamp` for `submittedAt`).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{RequestMessage, ResultRecord};

/// Content type attached to every encoded envelope body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Normalized key -> canonical field name for `RequestMessage`.
const REQUEST_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("subjectid", "subjectId"),
    ("profileid", "subjectId"),
    ("payload", "payload"),
    ("value", "payload"),
    ("status", "status"),
    ("submittedat", "submittedAt"),
    ("timestamp", "submittedAt"),
];

/// Normalized key -> canonical field name for `ResultRecord`.
const RESULT_FIELDS: &[(&str, &str)] = &[("id", "id"), ("status", "status"), ("value", "value")];

/// Errors from decoding a wire body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("field `{field}` is empty")]
    EmptyField { field: &'static str },
    #[error("unknown status token: {token}")]
    UnknownStatus { token: String },
}

/// Serializes a value to its wire form.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Decodes a queued request body.
///
/// # Errors
///
/// Returns `DecodeError` if the body is not a JSON object, lacks a required
/// field, carries an unknown status token, or has an empty `subjectId` or
/// `payload`.
pub fn decode_request(bytes: &[u8]) -> Result<RequestMessage, DecodeError> {
    let message: RequestMessage = decode_with(bytes, REQUEST_FIELDS)?;
    if message.subject_id.trim().is_empty() {
        return Err(DecodeError::EmptyField { field: "subjectId" });
    }
    if message.payload.is_empty() {
        return Err(DecodeError::EmptyField { field: "payload" });
    }
    Ok(message)
}

/// Decodes a stored result record.
///
/// # Errors
///
/// Returns `DecodeError` if the body is not a valid result record.
pub fn decode_result(bytes: &[u8]) -> Result<ResultRecord, DecodeError> {
    decode_with(bytes, RESULT_FIELDS)
}

fn decode_with<T: DeserializeOwned>(
    bytes: &[u8],
    fields: &[(&str, &str)],
) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject {
            found: json_kind(&value),
        });
    };
    let canonical = canonicalize_keys(object, fields);
    Ok(serde_json::from_value(Value::Object(canonical))?)
}

/// Rewrites object keys to their canonical names. Unknown keys are dropped;
/// when two keys map to the same field only one of them is kept.
fn canonicalize_keys(object: Map<String, Value>, fields: &[(&str, &str)]) -> Map<String, Value> {
    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        let normalized = normalize_key(&key);
        let Some((_, canonical)) = fields.iter().find(|(n, _)| *n == normalized) else {
            continue;
        };
        if !out.contains_key(*canonical) {
            out.insert((*canonical).to_string(), value);
        }
    }
    out
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
