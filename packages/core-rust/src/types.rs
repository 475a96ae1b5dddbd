use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::codec::DecodeError;

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Processing status of a request.
///
/// Encodes as the string tokens `in-progress`, `failed`, `success`.
/// Decoding also accepts the `PascalCase` variant names (any casing) and the
/// integer codes 0, 1, 2 used by older producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    /// Submitted, not yet processed. Never persisted in a `ResultRecord`.
    InProgress,
    /// Processed; the subject could not be found.
    Failed,
    /// Processed; the payload is echoed back in the result.
    Success,
}

impl RequestStatus {
    /// Wire token for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Failed => "failed",
            Self::Success => "success",
        }
    }

    /// Integer code for this status (0, 1, 2).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Failed => 1,
            Self::Success => 2,
        }
    }

    /// Maps an integer code back to a status.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::InProgress),
            1 => Some(Self::Failed),
            2 => Some(Self::Success),
            _ => None,
        }
    }

    /// Whether the consumer is done with a request in this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "inprogress" => Ok(Self::InProgress),
            "failed" => Ok(Self::Failed),
            "success" => Ok(Self::Success),
            _ => s
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(Self::from_code)
                .ok_or_else(|| DecodeError::UnknownStatus {
                    token: s.to_string(),
                }),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct StatusVisitor;

impl Visitor<'_> for StatusVisitor {
    type Value = RequestStatus;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a status token (in-progress, failed, success) or code 0-2")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RequestStatus, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RequestStatus, E> {
        RequestStatus::from_code(v)
            .ok_or_else(|| E::custom(format!("unknown status code: {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RequestStatus, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("unknown status code: {v}")))
            .and_then(|code| self.visit_u64(code))
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StatusVisitor)
    }
}

// ---------------------------------------------------------------------------
// RequestMessage
// ---------------------------------------------------------------------------

/// The unit of work placed on the queue.
///
/// Created by the producer with status `InProgress`. The consumer resolves it
/// exactly once via [`succeed`](Self::succeed) or [`fail`](Self::fail), which
/// consume the message and yield the terminal [`ResultRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Request id, also the key of the eventual result.
    pub id: Uuid,
    /// Entity the request concerns.
    pub subject_id: String,
    /// Opaque business value echoed back on success.
    pub payload: String,
    pub status: RequestStatus,
    pub submitted_at: DateTime<Utc>,
}

impl RequestMessage {
    /// Creates a new in-progress request with a fresh id.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            payload: payload.into(),
            status: RequestStatus::InProgress,
            submitted_at: Utc::now(),
        }
    }

    /// Resolves the request as successful, carrying the payload into the result.
    #[must_use]
    pub fn succeed(mut self) -> ResultRecord {
        self.status = RequestStatus::Success;
        ResultRecord {
            id: self.id,
            status: self.status,
            value: self.payload,
        }
    }

    /// Resolves the request as failed. The result carries no value.
    #[must_use]
    pub fn fail(mut self) -> ResultRecord {
        self.status = RequestStatus::Failed;
        ResultRecord {
            id: self.id,
            status: self.status,
            value: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ResultRecord
// ---------------------------------------------------------------------------

/// Durable, queryable outcome of processing one request.
///
/// `status` is always terminal; `value` is empty unless `status` is `Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: Uuid,
    pub status: RequestStatus,
    #[serde(default)]
    pub value: String,
}

impl ResultRecord {
    /// Key under which this record is stored.
    #[must_use]
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// External entity looked up by the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: String,
}

impl Subject {
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
