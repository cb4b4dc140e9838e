//! Per-request context handed to every workflow operation.
//!
//! A [`RequestContext`] carries a cancellation token (a child of the
//! process shutdown token, so new work is refused once shutdown starts) and
//! an optional [`TraceContext`] lifted from the W3C `traceparent` header or
//! gRPC metadata entry.

use crate::Error;
use tokio_util::sync::CancellationToken;

/// Header / metadata key carrying the W3C trace context.
pub const TRACEPARENT: &str = "traceparent";

/// Parsed W3C `traceparent` value: `version-traceid-parentid-flags`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub parent_id: String,
    pub sampled: bool,
}

impl TraceContext {
    /// Returns `None` for anything that is not a well-formed `traceparent`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent_id = parts.next()?;
        let flags = parts.next()?;

        let is_hex = |s: &str, len: usize| {
            s.len() == len && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        };
        if !is_hex(version, 2) || version == "ff" {
            return None;
        }
        if !is_hex(trace_id, 32) || trace_id.bytes().all(|b| b == b'0') {
            return None;
        }
        if !is_hex(parent_id, 16) || parent_id.bytes().all(|b| b == b'0') {
            return None;
        }
        if !is_hex(flags, 2) {
            return None;
        }
        // Version 00 has exactly four fields.
        if version == "00" && parts.next().is_some() {
            return None;
        }

        let flags = u8::from_str_radix(flags, 16).ok()?;
        Some(Self {
            trace_id: trace_id.to_string(),
            parent_id: parent_id.to_string(),
            sampled: flags & 0x01 == 0x01,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    trace: Option<TraceContext>,
}

impl RequestContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            trace: None,
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: Option<TraceContext>) -> Self {
        self.trace = trace;
        self
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.trace_id.as_str())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fails with [`Error::Cancelled`] once the context has been cancelled.
    pub fn ensure_active(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn parses_valid_traceparent() {
        let ctx = TraceContext::parse(VALID).unwrap();
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_id, "00f067aa0ba902b7");
        assert!(ctx.sampled);
    }

    #[test]
    fn rejects_malformed_traceparent() {
        assert!(TraceContext::parse("").is_none());
        assert!(TraceContext::parse("00-abc-def-01").is_none());
        assert!(
            TraceContext::parse("00-00000000000000000000000000000000-00f067aa0ba902b7-01")
                .is_none()
        );
        assert!(
            TraceContext::parse("ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
                .is_none()
        );
        assert!(TraceContext::parse(&format!("{VALID}-extra")).is_none());
        assert!(TraceContext::parse(&VALID.to_uppercase()).is_none());
    }

    #[test]
    fn cancelled_context_fails_fast() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new(token.child_token());
        assert!(ctx.ensure_active().is_ok());
        token.cancel();
        assert_eq!(ctx.ensure_active().unwrap_err(), Error::Cancelled);
    }
}
