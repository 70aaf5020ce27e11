//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding bridge messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload was not valid JSON, or could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level payload was not a JSON object
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// The `attribute` field was absent or not a string
    #[error("Missing or non-string `attribute` field")]
    MissingAttribute,

    /// A field had an unexpected shape
    #[error("Invalid `{field}` field: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
