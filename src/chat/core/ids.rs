// File: src/chat/core/ids.rs

//! Identifier types for conversations and messages.
//!
//! Conversation ids are opaque strings so that histories written by earlier
//! clients (which used `id-<millis>-<random>` ids) still load. Message ids are
//! UUIDs attached to every message so edits can address a message directly
//! instead of recomputing its position.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID intended to have good insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Errors returned when parsing a [`ConversationId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Contains whitespace or a control character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for ConversationIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "conversation id must not be empty"),
            Self::InvalidChar { ch, index } => {
                write!(f, "invalid char {ch:?} at index {index} in conversation id")
            }
        }
    }
}

impl std::error::Error for ConversationIdError {}

/// Identifier of a conversation, stable for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl Default for ConversationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in logs and prompts.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversationIdError::Empty);
        }
        if let Some((index, ch)) = s
            .char_indices()
            .find(|(_, ch)| ch.is_whitespace() || ch.is_control())
        {
            return Err(ConversationIdError::InvalidChar { ch, index });
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ConversationId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a single message inside a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl Default for MessageId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MessageId {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    #[inline]
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
