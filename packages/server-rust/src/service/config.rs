use std::path::PathBuf;
use std::time::Duration;

use crate::queue::InMemoryQueueConfig;
use crate::service::processor::ProcessorConfig;

/// Pipeline-level configuration: queue behavior, consumer concurrency,
/// shutdown timing, and result storage location.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Queue name, used in logs.
    pub queue_name: String,
    /// Maximum number of messages handled concurrently by the processor.
    pub max_concurrent_handlers: usize,
    /// How long one receive call waits for a delivery, in milliseconds.
    pub receive_wait_ms: u64,
    /// Grace period for in-flight handlers on shutdown, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Whether the producer creates a placeholder subject when none exists.
    pub auto_create_subjects: bool,
    /// Lease duration of one delivery, in milliseconds.
    pub visibility_timeout_ms: u64,
    /// Deliveries after which a message is dead-lettered.
    pub max_delivery_count: u32,
    /// Directory for result blobs. `None` keeps results in memory.
    pub result_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_name: "message".to_string(),
            max_concurrent_handlers: 16,
            receive_wait_ms: 1_000,
            shutdown_grace_ms: 30_000,
            auto_create_subjects: true,
            visibility_timeout_ms: 30_000,
            max_delivery_count: 10,
            result_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Settings for the in-memory queue transport.
    #[must_use]
    pub fn queue_config(&self) -> InMemoryQueueConfig {
        InMemoryQueueConfig {
            name: self.queue_name.clone(),
            visibility_timeout: Duration::from_millis(self.visibility_timeout_ms),
            max_delivery_count: self.max_delivery_count,
        }
    }

    /// Settings for the consumer's processor loop.
    #[must_use]
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_concurrent_handlers: self.max_concurrent_handlers.max(1),
            receive_wait: Duration::from_millis(self.receive_wait_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }
}
