//! The asynchronous request/result pipeline.
//!
//! 1. **Producer** (`producer`): ensures the subject exists, builds a request
//!    message, attaches the correlation token, publishes it
//! 2. **Consumer** (`consumer`): decodes one delivery, looks up the subject,
//!    persists the terminal result, then completes or abandons the lease
//! 3. **Processor** (`processor`): background loop pulling deliveries and
//!    running consumer handlers with bounded concurrency
//! 4. **Status query** (`status`): lenient read of a persisted result

pub mod config;
pub mod consumer;
pub mod error;
pub mod processor;
pub mod producer;
pub mod status;

pub use config::PipelineConfig;
pub use consumer::{DeliveryHandler, HandleOutcome, MessageHandler};
pub use error::PipelineError;
pub use processor::{ProcessorConfig, QueueProcessor};
pub use producer::{PayloadSource, Producer};
pub use status::{StatusQuery, NO_STATUS_FOUND};
