//! Queue transport types and the in-memory development transport.
//!
//! The transport contract (see [`QueueTransport`](crate::traits::QueueTransport))
//! is at-least-once: a delivery is leased to one receiver until it is
//! completed, abandoned, or its visibility timeout expires.

pub mod envelope;
pub mod memory;

pub use envelope::{Delivery, Envelope, LeaseId};
pub use memory::{DeadLetter, InMemoryQueue, InMemoryQueueConfig};

/// Errors reported by a queue transport.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("lease {0} is unknown or has expired")]
    UnknownLease(LeaseId),
}
