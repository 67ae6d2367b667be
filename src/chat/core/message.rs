//! Message model shared by the repository and the session context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::core::ids::MessageId;

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human input.
    User,
    /// Model (or fallback) reply.
    Assistant,
    /// Instructions injected into outbound requests.
    System,
}

impl Role {
    /// Stable string form for storage and wire payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Whether messages with this role belong in a persisted conversation.
    #[must_use]
    pub const fn is_dialogue(self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(value.to_string()),
        }
    }
}

/// A single message in a conversation.
///
/// Messages are immutable once appended; only the rewind protocol replaces
/// content, and it always drops everything after the replaced message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, generated when absent from stored data.
    #[serde(default)]
    pub id: MessageId,
    /// Author of the message.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Creation time in milliseconds since Unix epoch.
    #[serde(rename = "timestamp")]
    pub created_at: i64,
}

impl Message {
    /// Build a message with a fresh id.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            created_at: now_ms,
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>, now_ms: i64) -> Self {
        Self::new(Role::User, content, now_ms)
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>, now_ms: i64) -> Self {
        Self::new(Role::Assistant, content, now_ms)
    }
}

/// Keep at most `max_chars` characters of `text`.
#[must_use]
pub fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Keep at most `max_chars` characters, appending `...` when something was cut.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", truncate_to_chars(text, max_chars))
    } else {
        text.to_string()
    }
}
