//! Storage adapters and the conversation repository.

pub mod kv;
pub mod repository;
pub mod sqlite_kv;

pub use kv::{KeyValueStore, Loaded, MemoryStore, read_json};
pub use repository::{AppendOutcome, ConversationRepository, LoadOutcome};
pub use sqlite_kv::SqliteStore;
