//! Relay Server: asynchronous request/result pipeline over an at-least-once queue.
//!
//! A submission is published as a correlated message and answered with its
//! request id immediately. A background [`QueueProcessor`] resolves each
//! message against the subject store and writes a terminal result, which
//! the status endpoint serves back.

pub mod network;
pub mod queue;
pub mod service;
pub mod storage;
pub mod traits;

pub use network::{NetworkConfig, NetworkModule, ShutdownController};
pub use queue::{InMemoryQueue, InMemoryQueueConfig, QueueError};
pub use service::{
    MessageHandler, PipelineConfig, PipelineError, Producer, QueueProcessor, StatusQuery,
};
pub use storage::{BlobResultStore, FsBlobEngine, HashMapBlobEngine, InMemorySubjectStore};
pub use traits::{QueueTransport, ResultStore, SubjectStore};
