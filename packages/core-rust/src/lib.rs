//! Relay Core: request/result data model, wire codec, and correlation context.

pub mod codec;
pub mod context;
pub mod hash;
pub mod types;

pub use codec::{decode_request, decode_result, encode, DecodeError, CONTENT_TYPE_JSON};
pub use context::{CorrelationContext, SpanId, TraceId, CORRELATION_METADATA_KEY};
pub use hash::random_payload_token;
pub use types::{RequestMessage, RequestStatus, ResultRecord, Subject};
