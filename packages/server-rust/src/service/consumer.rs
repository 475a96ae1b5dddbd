//! Consumer side of the pipeline: one delivery in, one acknowledgment out.
//!
//! The handler decodes the request, looks up its subject, persists the
//! terminal result, and only then completes the lease. Any failure before
//! the write leaves the lease to be abandoned, so the transport redelivers
//! the message. Because the result write is an idempotent overwrite,
//! reprocessing a redelivered message is harmless.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use relay_core::{decode_request, CorrelationContext, RequestStatus, ResultRecord};
use tracing::field::Empty;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::queue::{Delivery, Envelope, LeaseId};
use crate::service::error::PipelineError;
use crate::traits::{QueueTransport, ResultStore, SubjectStore};

/// What happened to one delivery.
#[derive(Debug)]
pub enum HandleOutcome {
    /// A terminal result was stored and the lease completed.
    Completed(ResultRecord),
    /// The message could never be processed; it was completed without a result.
    Discarded(PipelineError),
    /// Processing failed transiently; the lease was abandoned for redelivery.
    Abandoned(PipelineError),
}

impl HandleOutcome {
    /// Label used for the `outcome` span field and metric.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(record) if record.status == RequestStatus::Success => "success",
            Self::Completed(_) => "failed",
            Self::Discarded(_) => "discarded",
            Self::Abandoned(_) => "abandoned",
        }
    }
}

/// Processes deliveries pulled by the [`QueueProcessor`](super::QueueProcessor).
///
/// The handler owns settlement: it must complete or abandon the delivery's
/// lease before returning.
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn handle(&self, queue: &dyn QueueTransport, delivery: Delivery) -> HandleOutcome;
}

/// Resolves request messages against the subject store and records results.
#[derive(Clone)]
pub struct MessageHandler {
    subjects: Arc<dyn SubjectStore>,
    results: Arc<dyn ResultStore>,
}

impl MessageHandler {
    #[must_use]
    pub fn new(subjects: Arc<dyn SubjectStore>, results: Arc<dyn ResultStore>) -> Self {
        Self { subjects, results }
    }

    /// Decodes one envelope and persists its terminal result.
    ///
    /// An absent subject is a business outcome, not an error: the request is
    /// recorded as failed.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Decode` if the body is not a valid request
    /// - `PipelineError::Lookup` if the subject store is unreachable
    /// - `PipelineError::Store` if the result cannot be written
    pub async fn process(&self, envelope: &Envelope) -> Result<ResultRecord, PipelineError> {
        let message = decode_request(&envelope.body)?;
        tracing::Span::current().record("request_id", tracing::field::display(message.id));

        let subject = self
            .subjects
            .get_subject(&message.subject_id)
            .await
            .map_err(PipelineError::Lookup)?;

        let record = match subject {
            Some(subject) => {
                debug!(
                    subject_id = %subject.id,
                    display_name = %subject.display_name,
                    "Subject found"
                );
                message.succeed()
            }
            None => {
                error!(subject_id = %message.subject_id, "Subject not found");
                message.fail()
            }
        };

        self.results
            .put(&record.key(), &record)
            .await
            .map_err(PipelineError::Store)?;

        Ok(record)
    }
}

/// Child span context for processing `envelope`, continuing the producer's
/// trace when the message carries a correlation token.
fn processing_context(envelope: &Envelope) -> CorrelationContext {
    CorrelationContext::child_of(envelope.correlation().as_ref())
}

async fn settle(queue: &dyn QueueTransport, lease: LeaseId, complete: bool) {
    let result = if complete {
        queue.complete(lease).await
    } else {
        queue.abandon(lease).await
    };
    if let Err(e) = result {
        // The lease will expire and the message will be redelivered.
        warn!(lease = %lease, complete, error = %e, "Failed to settle delivery");
    }
}

#[async_trait]
impl DeliveryHandler for MessageHandler {
    async fn handle(&self, queue: &dyn QueueTransport, delivery: Delivery) -> HandleOutcome {
        let ctx = processing_context(&delivery.envelope);
        let span = info_span!(
            "process_message",
            message_id = %delivery.message_id,
            delivery_count = delivery.delivery_count,
            trace_id = %ctx.trace_id,
            span_id = %ctx.span_id,
            parent_span_id = Empty,
            request_id = Empty,
            duration_ms = Empty,
            outcome = Empty,
        );
        if let Some(parent) = ctx.parent_span_id {
            span.record("parent_span_id", tracing::field::display(parent));
        }

        let start = Instant::now();
        let outcome = async {
            match self.process(&delivery.envelope).await {
                Ok(record) => {
                    settle(queue, delivery.lease, true).await;
                    HandleOutcome::Completed(record)
                }
                Err(e) if e.is_retryable() => {
                    error!(error = %e, kind = e.kind(), "Processing failed, abandoning delivery");
                    settle(queue, delivery.lease, false).await;
                    HandleOutcome::Abandoned(e)
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "Discarding unprocessable message");
                    settle(queue, delivery.lease, true).await;
                    HandleOutcome::Discarded(e)
                }
            }
        }
        .instrument(span.clone())
        .await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        span.record("duration_ms", duration_ms);
        span.record("outcome", outcome.label());
        metrics::counter!("relay_messages_total", "outcome" => outcome.label()).increment(1);

        outcome
    }
}
