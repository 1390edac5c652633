//! Error taxonomy for the relay pipeline.
//!
//! None of these are process-fatal: each one is either surfaced to an HTTP
//! caller, folded into a handler outcome, or logged and isolated to the
//! source/message it came from.

use thiserror::Error;

/// Malformed inbound signal. Never reaches history or handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid signal: {}", details.join("; "))]
pub struct ValidationError {
    pub details: Vec<String>,
}

impl ValidationError {
    pub fn new(details: Vec<String>) -> Self {
        Self { details }
    }

    pub fn single(detail: impl Into<String>) -> Self {
        Self {
            details: vec![detail.into()],
        }
    }
}

/// Transient failure reaching a `MessageSource`. The source's cursor is left
/// untouched and the fetch is retried on the next tick.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("source `{source_id}` unavailable: {reason}")]
    Unavailable { source_id: String, reason: String },

    #[error("source `{source_id}` timed out after {timeout_ms} ms")]
    Timeout { source_id: String, timeout_ms: u64 },

    #[error("source `{source_id}` returned undecodable data: {reason}")]
    Decode { source_id: String, reason: String },
}

impl SourceFetchError {
    pub fn unavailable(source_id: &str, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(source_id: &str, reason: impl ToString) -> Self {
        Self::Decode {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Unexpected failure while classifying one message. Only that message is
/// dropped; its siblings in the same tick keep processing.
#[derive(Debug, Error, PartialEq)]
pub enum ClassificationError {
    #[error("extracted price `{raw}` is not a finite number")]
    NonFinitePrice { raw: String },

    #[error("classifier failure: {0}")]
    Internal(String),
}

/// A consumer handler failed. Captured into that handler's outcome entry.
#[derive(Debug, Error)]
#[error("handler `{handler}` failed: {message}")]
pub struct HandlerError {
    pub handler: String,
    pub message: String,
}

/// Fire-and-forget forwarding to another process failed. Logged, never retried.
#[derive(Debug, Error)]
pub enum DownstreamDeliveryError {
    #[error("downstream request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("downstream {url} answered with status {status}")]
    Status { url: String, status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_details() {
        let e = ValidationError::new(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "invalid signal: a; b");
    }

    #[test]
    fn source_errors_name_the_source() {
        let e = SourceFetchError::unavailable("spot", "connection refused");
        assert!(e.to_string().contains("`spot`"));
        assert!(e.to_string().contains("connection refused"));
    }
}
