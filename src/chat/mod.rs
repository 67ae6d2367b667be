//! Conversation-state core for the Nova chat assistant.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, IDs, messages, conversations, and settings
//! - `storage`: Key-value adapters (`SQLite`, in-memory) and the conversation repository
//! - `session`: Active context mirror, edit/rewind, naming, and events
//! - `prompt`: System prompt construction
//! - `engine`: Main orchestration of a chat session

pub mod core;
pub mod engine;
pub mod prompt;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use self::core::{
    ChatConfig, ChatError, ChatResult, ChatSettings, Conversation, ConversationId, LlmConfig,
    Message, MessageId, NamingState, Personality, PersonalityKind, Role, ServerConfig,
    SessionConfig, StorageConfig, StorageKeys, Theme,
};
pub use engine::{ChatEngine, EditOutcome, Reply, ReplySource};
pub use prompt::build_system_prompt;
pub use session::{
    ChatEvent, ChatObserver, ContextEntry, EditTarget, NoticeLevel, RewindOutcome, SessionContext,
    TracingObserver,
};
pub use storage::{ConversationRepository, KeyValueStore, MemoryStore, SqliteStore};
