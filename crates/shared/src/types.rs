//! Shared value types used on both sides of the realtime connection.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token presented in the auth handshake.
///
/// Owned by the application's authentication state. The connection manager
/// only reads it; expiry is carried for the route guard, never checked here.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whitespace-only tokens count as empty.
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

// Tokens end up in logs through Debug; keep the secret out of them.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Kind of conversation a text frame targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Personal,
    Group,
}

/// Reference id keying a conversation in the message log and correlating
/// outbound messages with server acknowledgments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefId(String);

impl RefId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh client-generated correlation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RefId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RefId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_empty() {
        assert!(AuthToken::new("").is_empty());
        assert!(AuthToken::new("   ").is_empty());
        assert!(!AuthToken::new("abc").is_empty());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("super-secret");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_generated_ref_ids_are_unique() {
        assert_ne!(RefId::generate(), RefId::generate());
    }

    #[test]
    fn test_conversation_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ConversationType::Personal).expect("serialize"),
            "\"personal\""
        );
        assert_eq!(
            serde_json::to_string(&ConversationType::Group).expect("serialize"),
            "\"group\""
        );
    }
}
