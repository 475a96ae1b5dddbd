use relay_core::DecodeError;

/// Errors raised along the request/result pipeline.
///
/// Classification drives acknowledgment: `Decode` is terminal (the message is
/// discarded), `Lookup` and `Store` are transient (the message is abandoned
/// for redelivery), `Publish` and `EmptySubject` surface to the submitter.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("subject id must not be empty")]
    EmptySubject,
    #[error("malformed message: {0}")]
    Decode(#[from] DecodeError),
    #[error("subject lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),
    #[error("result store failed: {0}")]
    Store(#[source] anyhow::Error),
    #[error("publish failed: {0}")]
    Publish(#[source] anyhow::Error),
}

impl PipelineError {
    /// Whether redelivering the message may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lookup(_) | Self::Store(_))
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptySubject => "empty_subject",
            Self::Decode(_) => "decode",
            Self::Lookup(_) => "lookup",
            Self::Store(_) => "store",
            Self::Publish(_) => "publish",
        }
    }
}
