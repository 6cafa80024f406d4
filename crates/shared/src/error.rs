//! Frame encoding/decoding errors.

use thiserror::Error;

/// Error raised while parsing an inbound frame or encoding an outbound one.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The payload was valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// A field the frame kind requires was absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field was present but had the wrong shape.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Serializing an outbound frame failed.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl FrameError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
