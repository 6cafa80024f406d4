//! Outbound frames (client → messaging server)
//!
//! Every frame is a UTF-8 JSON object. Tagged frames carry a `type`
//! discriminator; custom frames are sent exactly as built by the caller.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FrameError;
use crate::types::{AuthToken, ConversationType, RefId};

/// Frame sent to the messaging server. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// One-shot authentication sent when the transport opens
    Auth { token: String },
    /// Text message addressed to a conversation
    Text {
        ref_id: RefId,
        conversation_type: ConversationType,
        text: String,
    },
    /// Caller-defined JSON object, transmitted verbatim
    Custom(Map<String, Value>),
}

/// Wire shape of the tagged variants.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedFrame<'a> {
    Auth {
        token: &'a str,
    },
    Message {
        ref_id: &'a RefId,
        conversation_type: ConversationType,
        text: &'a str,
    },
}

impl OutboundFrame {
    pub fn auth(token: &AuthToken) -> Self {
        Self::Auth {
            token: token.as_str().to_string(),
        }
    }

    pub fn text(
        ref_id: impl Into<RefId>,
        conversation_type: ConversationType,
        text: impl Into<String>,
    ) -> Self {
        Self::Text {
            ref_id: ref_id.into(),
            conversation_type,
            text: text.into(),
        }
    }

    /// Build a custom frame from any JSON value; only objects are accepted.
    pub fn custom(value: Value) -> Result<Self, FrameError> {
        match value {
            Value::Object(map) => Ok(Self::Custom(map)),
            _ => Err(FrameError::NotAnObject),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Text { .. } => "message",
            Self::Custom(_) => "custom",
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn encode(&self) -> Result<String, FrameError> {
        let encoded = match self {
            Self::Auth { token } => serde_json::to_string(&TaggedFrame::Auth { token }),
            Self::Text {
                ref_id,
                conversation_type,
                text,
            } => serde_json::to_string(&TaggedFrame::Message {
                ref_id,
                conversation_type: *conversation_type,
                text,
            }),
            Self::Custom(map) => serde_json::to_string(map),
        };
        encoded.map_err(FrameError::Encode)
    }
}
