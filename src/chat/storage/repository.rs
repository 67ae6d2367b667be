//! Conversation repository with write-through persistence.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::core::conversation::{Conversation, NamingState};
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::Message;
use crate::chat::storage::kv::{KeyValueStore, Loaded, read_json};

/// Result of appending a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AppendOutcome {
    /// Id of the appended message.
    pub message_id: MessageId,
    /// Number of oldest messages evicted to respect the cap.
    pub evicted: usize,
}

/// Result of loading the collection from the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored yet.
    Empty,
    /// Collection loaded with this many conversations.
    Loaded(usize),
    /// Stored data was unreadable; the collection starts empty.
    Corrupt(String),
}

/// Ordered collection of conversations, most recently created first.
///
/// Every mutation serializes the full collection to the store when history
/// saving is enabled. `create` is the exception: it only allocates in memory.
pub struct ConversationRepository {
    conversations: Vec<Conversation>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    message_limit: usize,
    save_history: bool,
}

impl ConversationRepository {
    /// Create an empty repository bound to `key` in `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        message_limit: usize,
        save_history: bool,
    ) -> Self {
        Self {
            conversations: Vec::new(),
            store,
            key: key.into(),
            message_limit: message_limit.max(1),
            save_history,
        }
    }

    /// Replace the in-memory collection with the stored one.
    ///
    /// Malformed data yields an empty collection and [`LoadOutcome::Corrupt`].
    pub fn load(&mut self) -> LoadOutcome {
        match read_json::<Vec<Conversation>>(self.store.as_ref(), &self.key) {
            Loaded::Missing => {
                self.conversations.clear();
                LoadOutcome::Empty
            }
            Loaded::Value(stored) => {
                let mut seen = HashSet::new();
                let total = stored.len();
                self.conversations = stored
                    .into_iter()
                    .filter(|c| seen.insert(c.id.clone()))
                    .collect();
                if self.conversations.len() != total {
                    warn!(
                        "Dropped {} duplicate conversation entries while loading",
                        total - self.conversations.len()
                    );
                }
                info!("Loaded {} conversations", self.conversations.len());
                LoadOutcome::Loaded(self.conversations.len())
            }
            Loaded::Corrupt(reason) => {
                self.conversations.clear();
                LoadOutcome::Corrupt(reason)
            }
        }
    }

    /// All conversations, most recently created first.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the repository holds no conversation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Current message cap.
    #[must_use]
    pub const fn message_limit(&self) -> usize {
        self.message_limit
    }

    /// Change the message cap for subsequent appends.
    pub fn set_message_limit(&mut self, limit: usize) {
        self.message_limit = limit.max(1);
    }

    /// Enable or disable write-through persistence.
    pub fn set_save_history(&mut self, enabled: bool) {
        self.save_history = enabled;
    }

    /// Allocate an empty conversation at the head of the collection.
    ///
    /// Nothing is written to the store until the next persisted mutation.
    pub fn create(&mut self, name: impl Into<String>, now_ms: i64) -> ConversationId {
        let conversation = Conversation::new(name, now_ms);
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        debug!("Created conversation {}", id);
        id
    }

    /// Insert a prepared conversation at the head and persist.
    ///
    /// Returns `false` (and changes nothing) if the id is already present.
    ///
    /// # Errors
    /// Returns an error if persisting fails.
    pub fn commit(&mut self, conversation: Conversation) -> ChatResult<bool> {
        if self.contains(&conversation.id) {
            debug!("Conversation {} already committed", conversation.id);
            return Ok(false);
        }
        info!("Committed conversation {}", conversation.id);
        self.conversations.insert(0, conversation);
        self.save()?;
        Ok(true)
    }

    /// Whether a conversation with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.iter().any(|c| &c.id == id)
    }

    /// Find a conversation by id.
    #[must_use]
    pub fn find(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    fn find_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    /// Append a message, evicting the oldest entries beyond the cap.
    ///
    /// Returns `None` if the conversation does not exist.
    ///
    /// # Errors
    /// Returns an error if persisting fails.
    pub fn append(
        &mut self,
        id: &ConversationId,
        message: Message,
        now_ms: i64,
    ) -> ChatResult<Option<AppendOutcome>> {
        let limit = self.message_limit;
        let Some(conversation) = self.find_mut(id) else {
            return Ok(None);
        };

        let message_id = message.id;
        conversation.push(message, now_ms);
        let evicted = conversation.evict_to(limit);
        if evicted > 0 {
            info!("Evicted {evicted} oldest messages from {id} (limit {limit})");
        }

        self.save()?;
        Ok(Some(AppendOutcome {
            message_id,
            evicted,
        }))
    }

    /// Replace the name of a conversation and mark it renamed.
    ///
    /// Returns `false` if the conversation does not exist.
    ///
    /// # Errors
    /// Returns an error if persisting fails.
    pub fn rename(&mut self, id: &ConversationId, name: &str) -> ChatResult<bool> {
        let Some(conversation) = self.find_mut(id) else {
            return Ok(false);
        };
        conversation.name = name.to_string();
        conversation.naming = NamingState::Renamed;
        self.save()?;
        Ok(true)
    }

    /// Replace a message's content and drop every message after it.
    ///
    /// Returns the new log length, or `None` if the conversation or message is missing.
    ///
    /// # Errors
    /// Returns an error if persisting fails.
    pub fn replace_and_truncate(
        &mut self,
        id: &ConversationId,
        message_id: MessageId,
        content: &str,
        now_ms: i64,
    ) -> ChatResult<Option<usize>> {
        let Some(conversation) = self.find_mut(id) else {
            return Ok(None);
        };
        let Some(position) = conversation.position_of(message_id) else {
            return Ok(None);
        };

        if let Some(message) = conversation.messages.get_mut(position) {
            message.content = content.to_string();
        }
        conversation.messages.truncate(position + 1);
        conversation.last_activity = now_ms;
        let len = conversation.messages.len();

        self.save()?;
        Ok(Some(len))
    }

    /// Remove a conversation.
    ///
    /// Returns `false` if the conversation does not exist.
    ///
    /// # Errors
    /// Returns an error if persisting fails.
    pub fn delete(&mut self, id: &ConversationId) -> ChatResult<bool> {
        let before = self.conversations.len();
        self.conversations.retain(|c| &c.id != id);
        if self.conversations.len() == before {
            return Ok(false);
        }
        info!("Deleted conversation {}", id);
        self.save()?;
        Ok(true)
    }

    /// Remove every conversation and the stored collection.
    ///
    /// # Errors
    /// Returns an error if the store cannot be updated.
    pub fn clear_all(&mut self) -> ChatResult<()> {
        self.conversations.clear();
        self.store.remove(&self.key)?;
        info!("Cleared all conversations");
        Ok(())
    }

    /// Conversation with the greatest `last_activity`; ties go to the earlier entry.
    #[must_use]
    pub fn most_recent(&self) -> Option<&Conversation> {
        self.conversations.iter().fold(None, |best, c| match best {
            Some(b) if b.last_activity >= c.last_activity => Some(b),
            _ => Some(c),
        })
    }

    /// Conversations whose name or messages contain `term`, case-insensitively.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        self.conversations.iter().filter(|c| c.matches(term)).collect()
    }

    /// Serialize the full collection to the store when history saving is enabled.
    ///
    /// # Errors
    /// Returns an error if serialization or the store write fails.
    pub fn save(&self) -> ChatResult<()> {
        if !self.save_history {
            return Ok(());
        }
        let json = serde_json::to_string(&self.conversations)?;
        self.store.set(&self.key, &json)
    }
}
