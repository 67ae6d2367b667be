//! Active session context: the flat role/content mirror of the current conversation.
//!
//! The mirror is a cache. It is rebuilt from the conversation before every
//! outbound request, so drift (edits, evictions, cross-tab loads) never
//! reaches the completion collaborator.

use tracing::debug;

use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::{Message, Role};
use crate::llm::completion::CompletionMessage;

/// One entry of the flat mirror.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContextEntry {
    /// Author role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Id of the mirrored message; `None` for local-only entries.
    pub message_id: Option<MessageId>,
}

impl ContextEntry {
    fn from_message(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            message_id: Some(message.id),
        }
    }
}

/// Tracks the active conversation and mirrors its messages.
#[derive(Debug, Default)]
pub struct SessionContext {
    active: Option<ConversationId>,
    entries: Vec<ContextEntry>,
    in_flight: bool,
}

impl SessionContext {
    /// Create an empty context with no active conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the context at `conversation`, replay its messages and reset the typing state.
    pub fn activate(&mut self, conversation: &Conversation) {
        self.active = Some(conversation.id.clone());
        self.in_flight = false;
        self.rebuild_from(conversation);
        debug!(
            "Activated conversation {} ({} messages)",
            conversation.id,
            self.entries.len()
        );
    }

    /// Id of the active conversation.
    #[must_use]
    pub const fn current_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Append to the mirror only; the entry is never persisted.
    #[cfg(test)]
    pub fn append_local(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(ContextEntry {
            role,
            content: content.into(),
            message_id: None,
        });
    }

    /// Mirror a message that was appended to the conversation.
    pub fn push_message(&mut self, message: &Message) {
        self.entries.push(ContextEntry::from_message(message));
    }

    /// Re-derive the mirror from the authoritative conversation.
    pub fn rebuild_from(&mut self, conversation: &Conversation) {
        self.entries = conversation
            .messages
            .iter()
            .filter(|m| m.role.is_dialogue())
            .map(ContextEntry::from_message)
            .collect();
    }

    /// Drop the `count` oldest entries, matching a repository eviction.
    pub fn evict_front(&mut self, count: usize) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
    }

    /// Mirror entries in order.
    #[must_use]
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Whether a completion request is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Mark a request as outstanding.
    ///
    /// # Errors
    /// Returns [`ChatError::RequestInFlight`] if one already is.
    pub fn begin_request(&mut self) -> ChatResult<()> {
        if self.in_flight {
            return Err(ChatError::RequestInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Clear the outstanding-request flag.
    pub fn end_request(&mut self) {
        self.in_flight = false;
    }

    /// Position of the entry mirroring `message_id`.
    #[must_use]
    pub fn position_of(&self, message_id: MessageId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.message_id == Some(message_id))
    }

    /// Position of the `ordinal`-th (0-based) user entry.
    #[must_use]
    pub fn user_position(&self, ordinal: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.role == Role::User)
            .nth(ordinal)
            .map(|(idx, _)| idx)
    }

    /// How many user entries precede `position`.
    #[must_use]
    pub fn user_ordinal_at(&self, position: usize) -> usize {
        self.entries
            .iter()
            .take(position)
            .filter(|e| e.role == Role::User)
            .count()
    }

    /// Replace the content at `position` and drop everything after it.
    pub fn replace_and_truncate(&mut self, position: usize, content: &str) {
        if let Some(entry) = self.entries.get_mut(position) {
            entry.content = content.to_string();
            self.entries.truncate(position + 1);
        }
    }

    /// Whether the dialogue entries equal the conversation's dialogue messages.
    #[must_use]
    pub fn mirrors(&self, conversation: &Conversation) -> bool {
        let mirrored = self
            .entries
            .iter()
            .filter(|e| e.role.is_dialogue())
            .map(|e| (e.role, e.content.as_str()));
        let persisted = conversation
            .messages
            .iter()
            .filter(|m| m.role.is_dialogue())
            .map(|m| (m.role, m.content.as_str()));
        mirrored.eq(persisted)
    }

    /// Outbound message list: optional system prompt followed by the mirror.
    #[must_use]
    pub fn outbound_messages(&self, system_prompt: Option<&str>) -> Vec<CompletionMessage> {
        let system = system_prompt.map(|content| CompletionMessage::new(Role::System, content));
        system
            .into_iter()
            .chain(
                self.entries
                    .iter()
                    .map(|e| CompletionMessage::new(e.role, e.content.clone())),
            )
            .collect()
    }
}
