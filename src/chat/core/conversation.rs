//! Conversation model: a named, ordered message log.

use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::{Message, Role, preview};

/// Naming lifecycle of a conversation.
///
/// `Pending` conversations hold only the welcome message and are never
/// persisted. The first user message moves them to `Named` (heuristic title),
/// and any later user rename or accepted generated title moves them to
/// `Renamed`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingState {
    /// Draft waiting for its first user message.
    Pending,
    /// Named from the first user message.
    #[default]
    Named,
    /// Name overridden by the user or the title generator.
    Renamed,
}

/// A conversation transcript.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable identifier.
    pub id: ConversationId,
    /// Display name.
    pub name: String,
    /// Last time `messages` changed, in milliseconds since Unix epoch.
    #[serde(rename = "timestamp")]
    pub last_activity: i64,
    /// Ordered message log.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Naming lifecycle state.
    #[serde(default)]
    pub naming: NamingState,
}

impl Conversation {
    /// Create an empty, already named conversation.
    #[must_use]
    pub fn new(name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: ConversationId::new(),
            name: name.into(),
            last_activity: now_ms,
            messages: Vec::new(),
            naming: NamingState::Named,
        }
    }

    /// Create a pending draft, optionally seeded with a welcome message.
    #[must_use]
    pub fn draft(name: impl Into<String>, welcome: Option<&str>, now_ms: i64) -> Self {
        let messages = welcome
            .map(|text| vec![Message::assistant(text, now_ms)])
            .unwrap_or_default();
        Self {
            id: ConversationId::new(),
            name: name.into(),
            last_activity: now_ms,
            messages,
            naming: NamingState::Pending,
        }
    }

    /// Append a message and bump `last_activity`.
    pub fn push(&mut self, message: Message, now_ms: i64) {
        self.messages.push(message);
        self.last_activity = now_ms;
    }

    /// Drop the oldest messages until at most `cap` remain; returns how many were dropped.
    pub fn evict_to(&mut self, cap: usize) -> usize {
        let excess = self.messages.len().saturating_sub(cap);
        if excess > 0 {
            self.messages.drain(..excess);
        }
        excess
    }

    /// Position of a message in the log.
    #[must_use]
    pub fn position_of(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Position of the `ordinal`-th (0-based) user message.
    #[must_use]
    pub fn user_position(&self, ordinal: usize) -> Option<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .nth(ordinal)
            .map(|(idx, _)| idx)
    }

    /// Number of user-authored messages.
    #[must_use]
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Case-insensitive match on name or any message content.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term)
            || self
                .messages
                .iter()
                .any(|m| m.content.to_lowercase().contains(&term))
    }

    /// Short preview of the first message for list views.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        self.messages.first().map_or_else(
            || "Empty conversation".to_string(),
            |m| preview(&m.content, max_chars),
        )
    }

    /// Render the transcript as Markdown.
    #[must_use]
    pub fn to_markdown(&self, assistant_label: &str) -> String {
        let title = if self.name.is_empty() {
            "Conversation"
        } else {
            &self.name
        };
        let mut out = format!("# {title}\n\n");
        for message in &self.messages {
            let author = match message.role {
                Role::User => "You",
                Role::Assistant => assistant_label,
                Role::System => "System",
            };
            out.push_str("## ");
            out.push_str(author);
            out.push('\n');
            out.push_str(&message.content);
            out.push_str("\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_holds_welcome_message() {
        let draft = Conversation::draft("New Chat (10:00)", Some("Hello!"), 5);
        assert_eq!(draft.naming, NamingState::Pending);
        assert_eq!(draft.messages.len(), 1);
        assert_eq!(draft.messages[0].role, Role::Assistant);
        assert_eq!(draft.user_message_count(), 0);
    }

    #[test]
    fn test_evict_to_drops_oldest() {
        let mut convo = Conversation::new("c", 0);
        for i in 0..5 {
            convo.push(Message::user(format!("m{i}"), i), i);
        }
        assert_eq!(convo.evict_to(3), 2);
        let contents: Vec<_> = convo.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
        assert_eq!(convo.evict_to(3), 0);
    }

    #[test]
    fn test_user_position_skips_assistant_messages() {
        let mut convo = Conversation::draft("c", Some("welcome"), 0);
        convo.push(Message::user("first", 1), 1);
        convo.push(Message::assistant("reply", 2), 2);
        convo.push(Message::user("second", 3), 3);
        assert_eq!(convo.user_position(0), Some(1));
        assert_eq!(convo.user_position(1), Some(3));
        assert_eq!(convo.user_position(2), None);
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let mut convo = Conversation::new("Rust lifetimes", 0);
        convo.push(Message::user("What is a Borrow?", 1), 1);
        assert!(convo.matches("LIFETIMES"));
        assert!(convo.matches("borrow"));
        assert!(!convo.matches("python"));
    }

    #[test]
    fn test_markdown_export() {
        let mut convo = Conversation::new("Greeting", 0);
        convo.push(Message::user("Hi", 1), 1);
        convo.push(Message::assistant("Hello", 2), 2);
        let md = convo.to_markdown("Aziona AI");
        assert_eq!(md, "# Greeting\n\n## You\nHi\n\n## Aziona AI\nHello\n\n");
    }

    #[test]
    fn test_missing_naming_defaults_to_named() {
        let json = r#"{"id":"id-1-abc","name":"x","timestamp":1,"messages":[]}"#;
        let convo: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(convo.naming, NamingState::Named);
    }
}
