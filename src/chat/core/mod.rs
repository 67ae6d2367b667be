//! Core conversation types, identifiers, settings and configuration.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;
pub mod settings;

pub use config::{ChatConfig, LlmConfig, ServerConfig, SessionConfig, StorageConfig, StorageKeys};
pub use conversation::{Conversation, NamingState};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationId, ConversationIdError, MessageId};
pub use message::{Message, Role, preview, truncate_to_chars};
pub use settings::{ChatSettings, Personality, PersonalityKind, Theme};
