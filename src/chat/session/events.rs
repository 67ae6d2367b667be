//! Session events and observers.
//!
//! The engine reports every user-visible change through a [`ChatObserver`]
//! instead of touching any presentation layer directly.

#[cfg(test)]
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::Role;

/// Severity of a [`ChatEvent::Notice`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// An action completed.
    Success,
    /// Something degraded but the session continues.
    Warning,
    /// An action failed.
    Error,
}

/// Something that happened in the chat session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChatEvent {
    /// A conversation became active.
    ConversationOpened {
        /// Conversation id.
        id: ConversationId,
        /// Display name.
        name: String,
        /// Whether it is an unsaved draft.
        pending: bool,
    },
    /// A pending draft was saved for the first time.
    ConversationCommitted {
        /// Conversation id.
        id: ConversationId,
        /// Name it was committed under.
        name: String,
    },
    /// A message was added to a conversation.
    MessageAppended {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// The new message.
        message_id: MessageId,
        /// Its author.
        role: Role,
    },
    /// Oldest messages were dropped to honour the message limit.
    MessagesEvicted {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// How many were dropped.
        count: usize,
    },
    /// A conversation got a new name.
    ConversationRenamed {
        /// Conversation id.
        id: ConversationId,
        /// New name.
        name: String,
    },
    /// A conversation was removed.
    ConversationDeleted {
        /// Conversation id.
        id: ConversationId,
    },
    /// Every conversation was removed.
    HistoryCleared,
    /// A user edit truncated the history.
    HistoryRewound {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// Log length after truncation.
        len: usize,
    },
    /// The assistant started or stopped "typing".
    TypingChanged {
        /// Whether a reply is pending.
        active: bool,
    },
    /// A short message for the user.
    Notice {
        /// Severity.
        level: NoticeLevel,
        /// Text to show.
        text: String,
    },
}

impl ChatEvent {
    /// Shorthand for a [`ChatEvent::Notice`].
    pub fn notice(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self::Notice {
            level,
            text: text.into(),
        }
    }
}

/// Receives session events.
pub trait ChatObserver: Send + Sync {
    /// Handle one event.
    fn notify(&self, event: &ChatEvent);
}

/// Observer that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ChatObserver for TracingObserver {
    fn notify(&self, event: &ChatEvent) {
        match event {
            ChatEvent::Notice { level, text } => match level {
                NoticeLevel::Info | NoticeLevel::Success => info!("{text}"),
                NoticeLevel::Warning => warn!("{text}"),
                NoticeLevel::Error => error!("{text}"),
            },
            ChatEvent::MessagesEvicted {
                conversation_id,
                count,
            } => info!("Evicted {count} old messages from {conversation_id}"),
            other => debug!("{other:?}"),
        }
    }
}

/// Observer that records events for later inspection.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ChatEvent>>,
}

#[cfg(test)]
impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every recorded event.
    pub fn drain(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl ChatObserver for EventLog {
    fn notify(&self, event: &ChatEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
