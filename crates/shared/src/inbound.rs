//! Inbound frames (messaging server → client)
//!
//! The server emits loosely-shaped JSON objects. Parsing happens once, here,
//! and produces a closed set of frame kinds so nothing downstream needs to
//! inspect raw JSON. Frames are classified by their `type` field, falling back
//! to `msgType`; an untagged object with a boolean `online` and a subject id
//! is a presence update.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::FrameError;
use crate::types::RefId;

const PRESENCE_TYPES: &[&str] = &["presence", "online_status", "user_status"];
const MESSAGE_TYPES: &[&str] = &["message", "chat_message", "direct_message"];
const RECEIPT_TYPES: &[&str] = &["delivery_receipt", "delivered", "ack"];
const NOTIFICATION_TYPES: &[&str] = &["notification"];

/// A user's online state changed.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceUpdate {
    pub user_id: String,
    pub online: bool,
    pub timestamp: DateTime<Utc>,
}

/// A message addressed to a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Option<String>,
    pub ref_id: RefId,
    /// The full frame as received
    pub payload: Value,
}

/// Server acknowledgment that message `id` in conversation `ref_id` was delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub id: String,
    pub ref_id: RefId,
}

/// Notification pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Server id, or a generated one when the server sent none
    pub id: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Presence(PresenceUpdate),
    Message(ChatMessage),
    DeliveryReceipt(DeliveryReceipt),
    Notification(Notification),
    /// Valid JSON object of a kind this client does not handle
    Unknown { raw: Value },
}

impl InboundFrame {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Presence(_) => "presence",
            Self::Message(_) => "message",
            Self::DeliveryReceipt(_) => "delivery_receipt",
            Self::Notification(_) => "notification",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Conversation/reference id the frame belongs to, if any.
    pub fn ref_id(&self) -> Option<RefId> {
        match self {
            Self::Message(msg) => Some(msg.ref_id.clone()),
            Self::DeliveryReceipt(receipt) => Some(receipt.ref_id.clone()),
            Self::Unknown { raw } => raw
                .as_object()
                .and_then(|obj| id_field(obj, &["ref_id", "refId"]))
                .map(RefId::from),
            Self::Presence(_) | Self::Notification(_) => None,
        }
    }
}

/// Parse one text frame.
///
/// `now` is used for presence events and notifications that carry no
/// timestamp of their own.
pub fn parse_inbound(text: &str, now: DateTime<Utc>) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
    let Value::Object(obj) = value else {
        return Err(FrameError::NotAnObject);
    };

    let Some(kind) = discriminator(&obj) else {
        if is_untagged_presence(&obj) {
            return parse_presence(&obj, now).map(InboundFrame::Presence);
        }
        return Ok(InboundFrame::Unknown {
            raw: Value::Object(obj),
        });
    };

    if PRESENCE_TYPES.contains(&kind) {
        parse_presence(&obj, now).map(InboundFrame::Presence)
    } else if MESSAGE_TYPES.contains(&kind) {
        let ref_id = id_field(&obj, &["ref_id", "refId"]).ok_or(FrameError::MissingField("ref_id"))?;
        Ok(InboundFrame::Message(ChatMessage {
            id: id_field(&obj, &["id", "message_id"]),
            ref_id: RefId::from(ref_id),
            payload: Value::Object(obj),
        }))
    } else if RECEIPT_TYPES.contains(&kind) {
        let id = id_field(&obj, &["id", "message_id"]).ok_or(FrameError::MissingField("id"))?;
        let ref_id = id_field(&obj, &["ref_id", "refId"]).ok_or(FrameError::MissingField("ref_id"))?;
        Ok(InboundFrame::DeliveryReceipt(DeliveryReceipt {
            id,
            ref_id: RefId::from(ref_id),
        }))
    } else if NOTIFICATION_TYPES.contains(&kind) {
        let received_at = match obj.get("timestamp") {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };
        Ok(InboundFrame::Notification(Notification {
            id: id_field(&obj, &["id"]).unwrap_or_else(|| Uuid::new_v4().to_string()),
            payload: Value::Object(obj),
            received_at,
        }))
    } else {
        Ok(InboundFrame::Unknown {
            raw: Value::Object(obj),
        })
    }
}

fn discriminator(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("type")
        .and_then(Value::as_str)
        .or_else(|| obj.get("msgType").and_then(Value::as_str))
}

/// Some presence events carry no discriminator at all: a boolean `online`
/// next to a subject id is enough to recognise them.
fn is_untagged_presence(obj: &Map<String, Value>) -> bool {
    matches!(obj.get("online"), Some(Value::Bool(_)))
        && id_field(obj, &["ref_id", "userId"]).is_some()
}

/// Presence events arrive in two upstream shapes: one names the subject
/// `ref_id`, the other `userId`. Both normalize to `user_id`, `ref_id` first.
fn parse_presence(obj: &Map<String, Value>, now: DateTime<Utc>) -> Result<PresenceUpdate, FrameError> {
    let user_id =
        id_field(obj, &["ref_id", "userId"]).ok_or(FrameError::MissingField("ref_id"))?;
    let online = match obj.get("online") {
        Some(Value::Bool(online)) => *online,
        Some(other) => {
            return Err(FrameError::invalid_field(
                "online",
                format!("expected boolean, got {}", other),
            ))
        }
        None => return Err(FrameError::MissingField("online")),
    };
    let timestamp = match obj.get("timestamp") {
        Some(Value::Null) | None => now,
        Some(raw) => parse_timestamp(raw)?,
    };

    Ok(PresenceUpdate {
        user_id,
        online,
        timestamp,
    })
}

/// First present field among `names`, accepting strings and integers.
fn id_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Milliseconds since the epoch, or an RFC 3339 string.
fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>, FrameError> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| FrameError::invalid_field("timestamp", "out of range")),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FrameError::invalid_field("timestamp", e.to_string())),
        other => Err(FrameError::invalid_field(
            "timestamp",
            format!("expected number or string, got {}", other),
        )),
    }
}
