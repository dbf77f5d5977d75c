//! Error types for huddle wire handling.

use thiserror::Error;

/// Errors raised while decoding push frames or backend payloads.
///
/// These are always recoverable: the offending frame or record is dropped.
#[derive(Debug, Error)]
pub enum WireError {
    /// STOMP frame could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Unknown STOMP command.
    #[error("unknown frame command: {0}")]
    UnknownCommand(String),

    /// A required frame header is absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// Payload is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload has the wrong JSON shape.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Payload should have been a JSON array.
    #[error("expected a JSON array, got {0}")]
    NotAnArray(&'static str),

    /// A required payload field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}
