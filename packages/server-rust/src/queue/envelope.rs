//! Transport envelope and delivery types.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use relay_core::{CorrelationContext, CONTENT_TYPE_JSON};
use uuid::Uuid;

/// A message as seen by the transport: opaque body plus string metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub body: Bytes,
    pub content_type: String,
    /// Application properties. Carries the correlation token.
    pub metadata: HashMap<String, String>,
}

impl Envelope {
    /// Creates a JSON envelope with empty metadata.
    #[must_use]
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Attaches the correlation token for `ctx`.
    #[must_use]
    pub fn with_correlation(mut self, ctx: &CorrelationContext) -> Self {
        ctx.inject(&mut self.metadata);
        self
    }

    /// Correlation context carried in the metadata, if any.
    #[must_use]
    pub fn correlation(&self) -> Option<CorrelationContext> {
        CorrelationContext::extract(&self.metadata)
    }
}

/// Identifies one lease on one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(Uuid);

impl LeaseId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One delivery attempt of a queued message.
///
/// The receiver must `complete` or `abandon` the lease; otherwise the message
/// becomes visible again once the visibility timeout expires.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Transport-assigned message id, stable across redeliveries.
    pub message_id: Uuid,
    pub lease: LeaseId,
    /// 1 on first delivery, incremented on each redelivery.
    pub delivery_count: u32,
    pub envelope: Envelope,
}
