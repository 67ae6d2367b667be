//! Edit/rewind protocol.
//!
//! Editing a past user message replaces its content and discards every later
//! message, in the persisted log and in the session mirror alike. Editing an
//! assistant message is cosmetic and leaves both untouched.

use tracing::{debug, warn};

use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::MessageId;
use crate::chat::core::message::Role;
use crate::chat::session::context::SessionContext;
use crate::chat::storage::repository::ConversationRepository;

/// Which message an edit applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EditTarget {
    /// A message addressed by its stable id.
    Message(MessageId),
    /// The Nth (0-based) displayed user message.
    UserOrdinal(usize),
}

/// What an edit did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RewindOutcome {
    /// A user message was replaced and the history truncated after it.
    Truncated {
        /// Id of the edited message.
        message_id: MessageId,
        /// Log length after truncation.
        len: usize,
    },
    /// The target was an assistant message; nothing was mutated.
    Cosmetic {
        /// Id of the targeted message, when known.
        message_id: Option<MessageId>,
    },
    /// The target could not be resolved; nothing was mutated.
    NotFound,
}

/// Apply an edit to the active conversation.
///
/// # Errors
/// Returns an error only if persisting the truncated log fails.
pub fn apply_edit(
    repository: &mut ConversationRepository,
    context: &mut SessionContext,
    target: EditTarget,
    new_text: &str,
    now_ms: i64,
) -> ChatResult<RewindOutcome> {
    let Some(conversation_id) = context.current_id().cloned() else {
        warn!("Edit requested with no active conversation");
        return Ok(RewindOutcome::NotFound);
    };

    let position = match target {
        EditTarget::Message(id) => context.position_of(id),
        EditTarget::UserOrdinal(ordinal) => context.user_position(ordinal),
    };
    let resolved = position.and_then(|p| context.entries().get(p).cloned().map(|e| (p, e)));
    let Some((position, entry)) = resolved else {
        warn!("Edit target {target:?} not found in conversation {conversation_id}");
        return Ok(RewindOutcome::NotFound);
    };

    if entry.role != Role::User {
        debug!("Cosmetic edit of a {} message", entry.role);
        return Ok(RewindOutcome::Cosmetic {
            message_id: entry.message_id,
        });
    }

    let Some(conversation) = repository.find(&conversation_id) else {
        warn!("Edit target belongs to unknown conversation {conversation_id}");
        return Ok(RewindOutcome::NotFound);
    };

    let persisted_id = entry
        .message_id
        .filter(|id| conversation.position_of(*id).is_some())
        .or_else(|| {
            let ordinal = context.user_ordinal_at(position);
            conversation
                .user_position(ordinal)
                .and_then(|p| conversation.messages.get(p))
                .map(|m| m.id)
        });
    let Some(persisted_id) = persisted_id else {
        warn!("Edited message is missing from the persisted log of {conversation_id}");
        return Ok(RewindOutcome::NotFound);
    };

    let Some(len) =
        repository.replace_and_truncate(&conversation_id, persisted_id, new_text, now_ms)?
    else {
        return Ok(RewindOutcome::NotFound);
    };
    context.replace_and_truncate(position, new_text);

    if let Some(conversation) = repository.find(&conversation_id) {
        if !context.mirrors(conversation) {
            warn!("Session mirror drifted from {conversation_id}; rebuilding");
            context.rebuild_from(conversation);
        }
    }

    debug!("Rewound {conversation_id} to {len} messages");
    Ok(RewindOutcome::Truncated {
        message_id: persisted_id,
        len,
    })
}
