//! Conversation title generation through the completion collaborator.

use chrono::{DateTime, Local};
use tracing::debug;

use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::{Role, preview};
use crate::chat::session::naming::clean_generated_title;
use crate::llm::completion::{
    CompletionClient, CompletionError, CompletionMessage, CompletionRequest, CompletionResult,
};

/// Preview length of the user message in the title prompt.
pub const USER_PREVIEW_CHARS: usize = 200;

/// Preview length of the assistant reply in the title prompt.
pub const REPLY_PREVIEW_CHARS: usize = 100;

const TITLE_SYSTEM_PROMPT: &str = "You are a helpful assistant that generates creative, unique conversation titles. \
Create a specific title that captures the main topic, using between 2-5 words. \
Be descriptive and varied in your naming approach. Each title should feel distinct even for similar topics.";

/// First exchange of a conversation, kept to ask for a title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleSeed {
    /// Conversation to retitle.
    pub conversation_id: ConversationId,
    /// First user message.
    pub user_message: String,
    /// First assistant reply.
    pub assistant_reply: String,
}

impl TitleSeed {
    /// Build the title request for this exchange.
    #[must_use]
    pub fn request(&self, model: &str, now: &DateTime<Local>) -> CompletionRequest {
        let prompt = format!(
            "Based on this conversation started on {} (ID: {}), generate a concise, specific, and UNIQUE title (max 5 words):\n\
User: {}\nAI: {}\n\n\
Important: Ensure this title is different from typical titles you might generate for similar conversations.",
            now.format("%Y-%m-%d %H:%M:%S"),
            self.conversation_id.short(),
            preview(&self.user_message, USER_PREVIEW_CHARS),
            preview(&self.assistant_reply, REPLY_PREVIEW_CHARS),
        );

        CompletionRequest::new(
            model,
            vec![
                CompletionMessage::new(Role::System, TITLE_SYSTEM_PROMPT),
                CompletionMessage::new(Role::User, prompt),
            ],
        )
        .with_temperature(0.9)
        .with_max_tokens(20)
        .with_top_p(1.0)
        .with_frequency_penalty(0.5)
    }
}

/// Ask `client` for a title and clean it up.
///
/// # Errors
/// Propagates the collaborator failure, or [`CompletionError::Malformed`] when
/// the reply holds no usable title.
pub async fn generate_title(
    client: &dyn CompletionClient,
    seed: &TitleSeed,
    model: &str,
) -> CompletionResult<String> {
    let request = seed.request(model, &Local::now());
    let raw = client.complete(&request).await?;
    let title = clean_generated_title(&raw).ok_or(CompletionError::Malformed)?;
    debug!("Generated title {title:?} for {}", seed.conversation_id);
    Ok(title)
}
