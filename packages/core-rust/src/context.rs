//! Correlation context linking a submission to its processing across the queue.
//!
//! The token format follows the W3C `traceparent` header:
//! `00-<32 hex trace id>-<16 hex span id>-<2 hex flags>`. It travels in the
//! envelope metadata under [`CORRELATION_METADATA_KEY`] and is only ever used
//! to link spans for observability. A missing or unparseable token never
//! changes how a message is processed.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;

/// Envelope metadata key carrying the correlation token.
pub const CORRELATION_METADATA_KEY: &str = "Diagnostic-Id";

const TRACEPARENT_VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// 128-bit trace identifier shared by every span of one causal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId([u8; 16]);

/// 64-bit identifier of a single span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

impl TraceId {
    fn random() -> Self {
        let mut rng = rand::rng();
        loop {
            let bytes: [u8; 16] = rng.random();
            if bytes != [0; 16] {
                return Self(bytes);
            }
        }
    }
}

impl SpanId {
    fn random() -> Self {
        let mut rng = rand::rng();
        loop {
            let bytes: [u8; 8] = rng.random();
            if bytes != [0; 8] {
                return Self(bytes);
            }
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Causality token for one processing span.
///
/// Not persisted and never part of a result record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    /// Trace shared with every causally linked span.
    pub trace_id: TraceId,
    /// This span.
    pub span_id: SpanId,
    /// Span this one was started from, if known.
    pub parent_span_id: Option<SpanId>,
    pub sampled: bool,
}

impl CorrelationContext {
    /// Starts a new trace.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Starts a span causally linked to this one, in the same trace.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }

    /// Continues the trace of `remote` when present, otherwise starts a new one.
    #[must_use]
    pub fn child_of(remote: Option<&Self>) -> Self {
        remote.map_or_else(Self::new_root, Self::child)
    }

    /// Renders the `traceparent`-style token for this span.
    #[must_use]
    pub fn to_header(&self) -> String {
        let flags = if self.sampled { FLAG_SAMPLED } else { 0 };
        format!(
            "{TRACEPARENT_VERSION}-{}-{}-{flags:02x}",
            self.trace_id, self.span_id
        )
    }

    /// Parses a `traceparent`-style token.
    ///
    /// Returns `None` for anything malformed, including all-zero ids and the
    /// reserved version `ff`. The parsed context describes the remote span,
    /// so its `parent_span_id` is always `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.trim().split('-');
        let version = parts.next()?;
        let trace = parts.next()?;
        let span = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || version.eq_ignore_ascii_case("ff") || hex::decode(version).is_err()
        {
            return None;
        }
        // Version 00 has exactly four fields; later versions may append more.
        if version == TRACEPARENT_VERSION && parts.next().is_some() {
            return None;
        }

        let trace_id: [u8; 16] = decode_fixed(trace)?;
        let span_id: [u8; 8] = decode_fixed(span)?;
        let [flags]: [u8; 1] = decode_fixed(flags)?;

        if trace_id == [0; 16] || span_id == [0; 8] {
            return None;
        }

        Some(Self {
            trace_id: TraceId(trace_id),
            span_id: SpanId(span_id),
            parent_span_id: None,
            sampled: flags & FLAG_SAMPLED != 0,
        })
    }

    /// Reads the token from envelope metadata, if present and well formed.
    #[must_use]
    pub fn extract(metadata: &HashMap<String, String>) -> Option<Self> {
        metadata
            .get(CORRELATION_METADATA_KEY)
            .and_then(|token| Self::parse(token))
    }

    /// Writes this span's token into envelope metadata.
    pub fn inject(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert(CORRELATION_METADATA_KEY.to_string(), self.to_header());
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != N * 2 {
        return None;
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn root_has_no_parent() {
        let ctx = CorrelationContext::new_root();
        assert!(ctx.parent_span_id.is_none());
        assert!(ctx.sampled);
    }

    #[test]
    fn child_keeps_trace_and_links_parent() {
        let root = CorrelationContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_ne!(child.span_id, root.span_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
    }

    #[test]
    fn child_of_none_starts_new_trace() {
        let ctx = CorrelationContext::child_of(None);
        assert!(ctx.parent_span_id.is_none());
    }

    #[test]
    fn header_round_trips_through_parse() {
        let ctx = CorrelationContext::new_root();
        let parsed = CorrelationContext::parse(&ctx.to_header()).unwrap();
        assert_eq!(parsed.trace_id, ctx.trace_id);
        assert_eq!(parsed.span_id, ctx.span_id);
        assert!(parsed.sampled);
    }

    #[test]
    fn parses_reference_traceparent() {
        let ctx = CorrelationContext::parse(VALID).unwrap();
        assert_eq!(ctx.trace_id.to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.span_id.to_string(), "00f067aa0ba902b7");
        assert_eq!(ctx.to_header(), VALID);
    }

    #[test]
    fn unsampled_flag_is_preserved() {
        let token = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00";
        let ctx = CorrelationContext::parse(token).unwrap();
        assert!(!ctx.sampled);
        assert!(!ctx.child().sampled);
        assert_eq!(ctx.to_header(), token);
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in [
            "",
            "garbage",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-4bf92f3577b34da6a3ce929d0e0e473-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
            "00-zzf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        ] {
            assert!(CorrelationContext::parse(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn inject_then_extract() {
        let ctx = CorrelationContext::new_root();
        let mut metadata = HashMap::new();
        ctx.inject(&mut metadata);
        assert!(metadata.contains_key(CORRELATION_METADATA_KEY));

        let extracted = CorrelationContext::extract(&metadata).unwrap();
        assert_eq!(extracted.trace_id, ctx.trace_id);
    }

    #[test]
    fn extract_ignores_missing_or_bad_token() {
        let mut metadata = HashMap::new();
        assert!(CorrelationContext::extract(&metadata).is_none());

        metadata.insert(CORRELATION_METADATA_KEY.to_string(), "nope".to_string());
        assert!(CorrelationContext::extract(&metadata).is_none());
    }
}
