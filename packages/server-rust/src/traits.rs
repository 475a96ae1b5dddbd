use std::time::Duration;

use async_trait::async_trait;
use relay_core::{ResultRecord, Subject};

use crate::queue::{Delivery, Envelope, LeaseId, QueueError};

/// Lookup gateway over the subject (profile) store.
/// Implementations: in-memory (dev/tests); managed document stores behind this seam.
///
/// Must allow concurrent calls from many in-flight handlers without external locking.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Point lookup by subject id. `Ok(None)` means the subject does not exist.
    async fn get_subject(&self, id: &str) -> anyhow::Result<Option<Subject>>;

    /// Insert or replace a subject.
    async fn upsert_subject(&self, subject: &Subject) -> anyhow::Result<()>;
}

/// Durable result store, keyed by request id.
///
/// `put` overwrites any previous record for the same id, which makes
/// reprocessing after redelivery safe.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a terminal result under `id`, replacing any existing record.
    async fn put(&self, id: &str, record: &ResultRecord) -> anyhow::Result<()>;

    /// Load the result for `id`. `Ok(None)` means nothing has been stored.
    async fn get(&self, id: &str) -> anyhow::Result<Option<ResultRecord>>;
}

/// At-least-once message queue with per-delivery leases.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue an envelope.
    async fn publish(&self, envelope: Envelope) -> Result<(), QueueError>;

    /// Wait up to `max_wait` for the next delivery.
    ///
    /// Returns `Ok(None)` on timeout and `Err(QueueError::Closed)` once the
    /// queue is closed and drained. Cancelling the returned future must not
    /// lose a message.
    async fn receive(&self, max_wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Acknowledge a delivery; the message is removed permanently.
    async fn complete(&self, lease: LeaseId) -> Result<(), QueueError>;

    /// Release a delivery so the transport redelivers it.
    async fn abandon(&self, lease: LeaseId) -> Result<(), QueueError>;
}
