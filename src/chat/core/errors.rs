//! Error types for the conversation core.

use thiserror::Error;

use crate::chat::core::ids::ConversationId;

/// Conversation core error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `SQLite` storage error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The key-value store could not be reached (poisoned lock, closed handle).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// A message with no visible content was submitted.
    #[error("message is empty")]
    EmptyMessage,
    /// A completion request is already outstanding for the active conversation.
    #[error("a request is already in flight")]
    RequestInFlight,
    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),
    /// No committed conversation is active to receive a reply.
    #[error("no active conversation")]
    NoActiveConversation,
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// HTTP client construction error.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience result alias for conversation operations.
pub type ChatResult<T> = Result<T, ChatError>;
