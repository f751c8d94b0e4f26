//! Decode errors for inbound reaction payloads.

use thiserror::Error;

/// Errors produced while decoding an inbound reaction.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not a JSON object with a string `type` field.
    #[error("malformed reaction payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The `type` field was present but empty.
    #[error("reaction type must not be empty")]
    EmptyType,
}
