//! Request producer: turns a submission into a correlated queue message.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use relay_core::{encode, random_payload_token, CorrelationContext, RequestMessage, Subject};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::queue::Envelope;
use crate::service::error::PipelineError;
use crate::traits::{QueueTransport, SubjectStore};

/// Source of the placeholder business payload attached to each request.
pub type PayloadSource = Arc<dyn Fn() -> String + Send + Sync>;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald", "Margaret", "Ken", "Frances", "Dennis",
];
const LAST_NAMES: &[&str] = &[
    "Lovelace", "Hopper", "Turing", "Dijkstra", "Liskov", "Knuth", "Hamilton", "Thompson",
    "Allen", "Ritchie",
];

/// `outcome` label of `relay_submissions_total`: `accepted`, or the error kind.
fn submission_outcome(result: &Result<Uuid, PipelineError>) -> &'static str {
    match result {
        Ok(_) => "accepted",
        Err(e) => e.kind(),
    }
}

/// Generates a human-like display name for an auto-created subject.
fn placeholder_display_name() -> String {
    let mut rng = rand::rng();
    let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Unknown");
    let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Subject");
    format!("{first} {last}")
}

/// Builds and publishes request messages.
///
/// Returns as soon as the message is published; it never waits for the
/// consumer. Failures are surfaced to the caller without retry.
#[derive(Clone)]
pub struct Producer {
    subjects: Arc<dyn SubjectStore>,
    queue: Arc<dyn QueueTransport>,
    auto_create_subjects: bool,
    payload_source: PayloadSource,
}

impl Producer {
    /// Creates a producer that auto-creates missing subjects and attaches
    /// random payload tokens.
    #[must_use]
    pub fn new(subjects: Arc<dyn SubjectStore>, queue: Arc<dyn QueueTransport>) -> Self {
        Self {
            subjects,
            queue,
            auto_create_subjects: true,
            payload_source: Arc::new(random_payload_token),
        }
    }

    /// Enables or disables placeholder creation for unknown subjects.
    #[must_use]
    pub fn with_auto_create_subjects(mut self, enabled: bool) -> Self {
        self.auto_create_subjects = enabled;
        self
    }

    /// Replaces the payload generator.
    #[must_use]
    pub fn with_payload_source(mut self, source: PayloadSource) -> Self {
        self.payload_source = source;
        self
    }

    /// Submits a request for `subject_id` in a new trace.
    ///
    /// # Errors
    ///
    /// See [`submit_with_context`](Self::submit_with_context).
    pub async fn submit(&self, subject_id: &str) -> Result<Uuid, PipelineError> {
        self.submit_with_context(subject_id, None).await
    }

    /// Submits a request for `subject_id`, continuing the trace of `parent`
    /// when given.
    ///
    /// The subject is looked up first and, if absent and auto-creation is
    /// enabled, a placeholder is upserted before the message is published.
    ///
    /// # Errors
    ///
    /// - `PipelineError::EmptySubject` for a blank subject id
    /// - `PipelineError::Lookup` if the subject store is unreachable
    /// - `PipelineError::Publish` if the queue rejects the message
    pub async fn submit_with_context(
        &self,
        subject_id: &str,
        parent: Option<&CorrelationContext>,
    ) -> Result<Uuid, PipelineError> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(PipelineError::EmptySubject);
        }

        let ctx = CorrelationContext::child_of(parent);
        let span = info_span!(
            "submit",
            subject_id,
            trace_id = %ctx.trace_id,
            span_id = %ctx.span_id,
            request_id = tracing::field::Empty,
        );

        let result = self.submit_in_span(subject_id, &ctx).instrument(span).await;
        metrics::counter!("relay_submissions_total", "outcome" => submission_outcome(&result))
            .increment(1);
        result
    }

    async fn submit_in_span(
        &self,
        subject_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<Uuid, PipelineError> {
        self.ensure_subject(subject_id).await?;

        let message = RequestMessage::new(subject_id, (self.payload_source)());
        let request_id = message.id;
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let body = encode(&message).map_err(|e| PipelineError::Publish(e.into()))?;
        let envelope = Envelope::json(body).with_correlation(ctx);

        info!(
            request_id = %request_id,
            trace_id = %ctx.trace_id,
            "Publishing message"
        );

        self.queue
            .publish(envelope)
            .await
            .map_err(|e| PipelineError::Publish(e.into()))?;

        Ok(request_id)
    }

    async fn ensure_subject(&self, subject_id: &str) -> Result<(), PipelineError> {
        let existing = self
            .subjects
            .get_subject(subject_id)
            .await
            .map_err(PipelineError::Lookup)?;

        if existing.is_some() || !self.auto_create_subjects {
            return Ok(());
        }

        let subject = Subject::new(subject_id, placeholder_display_name());
        debug!(
            subject_id,
            display_name = %subject.display_name,
            "Creating placeholder subject"
        );
        self.subjects
            .upsert_subject(&subject)
            .await
            .map_err(PipelineError::Lookup)
    }
}
