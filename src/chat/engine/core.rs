//! Chat engine orchestration.
//!
//! `ChatEngine` owns the repository, the session context, the pending draft,
//! and the settings. It is driven through `&mut self`; the only suspension
//! points are calls to the completion and video collaborators.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::conversation::{Conversation, NamingState};
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::{Message, Role};
use crate::chat::core::settings::{ChatSettings, Personality};
use crate::chat::prompt::build_system_prompt;
use crate::chat::session::context::SessionContext;
use crate::chat::session::events::{ChatEvent, ChatObserver, NoticeLevel};
use crate::chat::session::naming::{heuristic_name, normalize_user_name, pending_name};
use crate::chat::session::rewind::{EditTarget, RewindOutcome, apply_edit};
use crate::chat::storage::kv::{KeyValueStore, Loaded, read_json};
use crate::chat::storage::repository::{AppendOutcome, ConversationRepository, LoadOutcome};
use crate::llm::completion::{CompletionClient, CompletionError, CompletionRequest};
use crate::llm::fallback::fallback_response;
use crate::llm::suggestions::suggest;
use crate::llm::title::{self, TitleSeed};
use crate::video::{AnswerStatus, VideoClient, VideoIntent, answer, detect_intent};

/// Where an assistant reply came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplySource {
    /// The completion collaborator.
    Completion,
    /// The canned offline reply.
    Fallback,
    /// A YouTube search or video analysis.
    Video,
}

/// Assistant reply appended to the active conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Id of the appended assistant message.
    pub message_id: MessageId,
    /// Reply text.
    pub content: String,
    /// Origin of the text.
    pub source: ReplySource,
    /// Set after the first successful exchange of a heuristically named conversation.
    pub title_request: Option<TitleSeed>,
}

/// Result of [`ChatEngine::edit`].
#[derive(Clone, Debug, PartialEq)]
pub enum EditOutcome {
    /// History was rewound; send this request and pass the result to [`ChatEngine::complete`].
    Resend(CompletionRequest),
    /// An assistant message was targeted; nothing changed.
    Cosmetic,
    /// The target could not be resolved; nothing changed.
    NotFound,
}

/// Conversation-state engine.
pub struct ChatEngine {
    config: ChatConfig,
    store: Arc<dyn KeyValueStore>,
    repository: ConversationRepository,
    context: SessionContext,
    pending: Option<Conversation>,
    settings: ChatSettings,
    personality: Personality,
    observer: Arc<dyn ChatObserver>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl ChatEngine {
    /// Load settings, personality and history from `store` and open a conversation.
    ///
    /// The stored active conversation is reopened when it still exists, else the
    /// most recent one, else a fresh pending draft.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the store cannot be written.
    pub fn open(
        config: ChatConfig,
        store: Arc<dyn KeyValueStore>,
        observer: Arc<dyn ChatObserver>,
    ) -> ChatResult<Self> {
        config.validate()?;
        let keys = config.storage.keys.clone();

        let settings: ChatSettings = load_or_notify(
            store.as_ref(),
            &keys.settings,
            observer.as_ref(),
            "Settings could not be read; defaults restored",
        );
        let personality: Personality = load_or_notify(
            store.as_ref(),
            &keys.personality,
            observer.as_ref(),
            "Personality could not be read; defaults restored",
        );

        let mut repository = ConversationRepository::new(
            Arc::clone(&store),
            keys.conversations,
            settings.effective_message_limit(),
            settings.save_history,
        );

        let mut stored_active: Option<ConversationId> = None;
        if settings.save_history {
            if let LoadOutcome::Corrupt(reason) = repository.load() {
                warn!("Conversation history is unreadable: {reason}");
                observer.notify(&ChatEvent::notice(
                    NoticeLevel::Warning,
                    "Saved conversations could not be read and were reset",
                ));
            }
            stored_active = match store.get(&keys.active_conversation) {
                Ok(raw) => raw.and_then(|raw| raw.trim().trim_matches('"').parse().ok()),
                Err(err) => {
                    warn!("Failed to read the active conversation: {err}");
                    None
                }
            };
        }

        let target = stored_active
            .filter(|id| repository.contains(id))
            .or_else(|| repository.most_recent().map(|c| c.id.clone()));

        let mut engine = Self {
            config,
            store,
            repository,
            context: SessionContext::new(),
            pending: None,
            settings,
            personality,
            observer,
        };

        match target {
            Some(id) => engine.activate(&id)?,
            None => {
                engine.new_conversation();
            }
        }

        info!(
            "Chat engine ready ({} conversations)",
            engine.repository.len()
        );
        Ok(engine)
    }

    fn emit(&self, event: ChatEvent) {
        self.observer.notify(&event);
    }

    fn notice(&self, level: NoticeLevel, text: impl Into<String>) {
        self.emit(ChatEvent::notice(level, text));
    }

    fn persist_active(&self, id: &ConversationId) -> ChatResult<()> {
        if !self.settings.save_history {
            return Ok(());
        }
        self.store
            .set(&self.config.storage.keys.active_conversation, id.as_str())
    }

    fn forget_active(&self) -> ChatResult<()> {
        self.store
            .remove(&self.config.storage.keys.active_conversation)
    }

    /// Open a fresh pending draft holding only the welcome message.
    ///
    /// Nothing is persisted until the first user message.
    pub fn new_conversation(&mut self) -> ConversationId {
        let now = Local::now();
        let welcome = Some(self.config.session.welcome_message.as_str()).filter(|w| !w.is_empty());
        let draft = Conversation::draft(pending_name(&now), welcome, now.timestamp_millis());
        let id = draft.id.clone();

        self.context.activate(&draft);
        self.emit(ChatEvent::ConversationOpened {
            id: id.clone(),
            name: draft.name.clone(),
            pending: true,
        });
        if let Some(discarded) = self.pending.replace(draft) {
            debug!("Discarded pending draft {}", discarded.id);
        }
        id
    }

    /// Make a stored conversation the active one. Any pending draft is discarded.
    ///
    /// # Errors
    /// [`ChatError::ConversationNotFound`] for an unknown id, or a store error.
    pub fn activate(&mut self, id: &ConversationId) -> ChatResult<()> {
        if self.pending.as_ref().is_some_and(|p| &p.id == id) {
            return Ok(());
        }
        let Some(conversation) = self.repository.find(id) else {
            return Err(ChatError::ConversationNotFound(id.clone()));
        };

        self.context.activate(conversation);
        let name = conversation.name.clone();
        self.pending = None;
        self.persist_active(id)?;
        self.emit(ChatEvent::ConversationOpened {
            id: id.clone(),
            name,
            pending: false,
        });
        Ok(())
    }

    /// Commit the pending draft (if any) and return the id that receives the next user message.
    fn ensure_committed(&mut self, first_message: &str) -> ChatResult<ConversationId> {
        if let Some(mut draft) = self.pending.take() {
            if draft.naming == NamingState::Pending {
                draft.name = heuristic_name(first_message);
                draft.naming = NamingState::Named;
            }
            let id = draft.id.clone();
            let name = draft.name.clone();
            if self.repository.commit(draft)? {
                self.emit(ChatEvent::ConversationCommitted {
                    id: id.clone(),
                    name,
                });
            }
            self.persist_active(&id)?;
            return Ok(id);
        }

        let current = self
            .context
            .current_id()
            .filter(|id| self.repository.contains(id))
            .cloned();
        if let Some(id) = current {
            return Ok(id);
        }
        self.new_conversation();
        self.ensure_committed(first_message)
    }

    /// Append to a stored conversation or to the pending draft, honouring the cap.
    fn append_to(&mut self, id: &ConversationId, message: Message) -> ChatResult<MessageId> {
        let role = message.role;
        let mirrored = message.clone();
        let limit = self.repository.message_limit();
        let outcome = if let Some(draft) = self.pending.as_mut().filter(|p| &p.id == id) {
            let message_id = message.id;
            draft.push(message, now_ms());
            AppendOutcome {
                message_id,
                evicted: draft.evict_to(limit),
            }
        } else {
            let Some(outcome) = self.repository.append(id, message, now_ms())? else {
                return Err(ChatError::ConversationNotFound(id.clone()));
            };
            outcome
        };

        if self.context.current_id() == Some(id) {
            self.context.push_message(&mirrored);
            self.context.evict_front(outcome.evicted);
        }

        self.emit(ChatEvent::MessageAppended {
            conversation_id: id.clone(),
            message_id: outcome.message_id,
            role,
        });
        if outcome.evicted > 0 {
            self.emit(ChatEvent::MessagesEvicted {
                conversation_id: id.clone(),
                count: outcome.evicted,
            });
            self.notice(
                NoticeLevel::Info,
                format!(
                    "Older messages were removed to stay within the {}-message limit",
                    self.repository.message_limit()
                ),
            );
        }
        Ok(outcome.message_id)
    }

    /// Outbound request for the active conversation.
    ///
    /// The mirror is re-derived from the stored conversation first; the system
    /// prompt only exists in the returned copy.
    pub fn outbound_request(&mut self) -> CompletionRequest {
        let active = self.context.current_id().cloned();
        let conversation = active
            .as_ref()
            .and_then(|id| self.repository.find(id))
            .or(self.pending.as_ref());
        if let Some(conversation) = conversation {
            self.context.rebuild_from(conversation);
        }

        let system = build_system_prompt(&self.personality);
        CompletionRequest::from_config(
            self.settings.model.clone(),
            self.context.outbound_messages(Some(&system)),
            &self.config.llm,
        )
    }

    /// Record a user message and return the request to send.
    ///
    /// A pending draft is committed first, named from this message.
    ///
    /// # Errors
    /// [`ChatError::EmptyMessage`] for blank text, [`ChatError::RequestInFlight`]
    /// while a reply is outstanding, or a store error.
    pub fn submit(&mut self, text: &str) -> ChatResult<CompletionRequest> {
        self.begin_exchange(text)?;
        Ok(self.outbound_request())
    }

    /// Validate and record a user message, then set the typing state.
    fn begin_exchange(&mut self, text: &str) -> ChatResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.context.is_in_flight() {
            return Err(ChatError::RequestInFlight);
        }

        let id = self.ensure_committed(text)?;
        self.append_to(&id, Message::user(text, now_ms()))?;

        self.context.begin_request()?;
        self.emit(ChatEvent::TypingChanged { active: true });
        Ok(())
    }

    /// Clear the typing state and resolve the conversation that receives the reply.
    ///
    /// That is whatever is current when the reply lands, stored or pending.
    fn end_exchange(&mut self) -> ChatResult<ConversationId> {
        self.context.end_request();
        self.emit(ChatEvent::TypingChanged { active: false });

        let current = self.context.current_id().filter(|id| {
            self.repository.contains(id) || self.pending.as_ref().is_some_and(|p| &p.id == *id)
        });
        current.cloned().ok_or_else(|| {
            warn!("Dropping a reply: no conversation is active");
            ChatError::NoActiveConversation
        })
    }

    fn deliver(
        &mut self,
        id: &ConversationId,
        content: String,
        source: ReplySource,
    ) -> ChatResult<Reply> {
        let message_id = self.append_to(id, Message::assistant(content.clone(), now_ms()))?;
        let title_request = match source {
            ReplySource::Completion => self.title_seed(id),
            ReplySource::Fallback | ReplySource::Video => None,
        };

        Ok(Reply {
            message_id,
            content,
            source,
            title_request,
        })
    }

    /// Append the outcome of a completion call to the active conversation.
    ///
    /// A failed call is recovered with a fallback reply and an error notice.
    /// A reply that lands after the user switched conversations goes to the
    /// one now active, including an unsaved draft.
    ///
    /// # Errors
    /// [`ChatError::NoActiveConversation`] if no conversation is active, or a store error.
    pub fn complete(&mut self, result: Result<String, CompletionError>) -> ChatResult<Reply> {
        let id = self.end_exchange()?;

        let (content, source) = match result {
            Ok(content) => (content, ReplySource::Completion),
            Err(err) => {
                warn!("Completion failed for {id}: {err}");
                self.notice(NoticeLevel::Error, format!("API Error: {err}"));
                (
                    fallback_response(self.personality.kind),
                    ReplySource::Fallback,
                )
            }
        };
        self.deliver(&id, content, source)
    }

    fn title_seed(&self, id: &ConversationId) -> Option<TitleSeed> {
        let conversation = self.repository.find(id)?;
        if conversation.naming != NamingState::Named || conversation.user_message_count() != 1 {
            return None;
        }
        let user_message = conversation
            .messages
            .iter()
            .find(|m| m.role == Role::User)?;
        let reply = conversation
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)?;
        Some(TitleSeed {
            conversation_id: id.clone(),
            user_message: user_message.content.clone(),
            assistant_reply: reply.content.clone(),
        })
    }

    /// Submit `text`, await the reply, and request a title after the first exchange.
    ///
    /// # Errors
    /// Same as [`Self::submit`] and [`Self::complete`].
    pub async fn send(&mut self, client: &dyn CompletionClient, text: &str) -> ChatResult<Reply> {
        let request = self.submit(text)?;
        let result = client.complete(&request).await;
        let reply = self.complete(result)?;

        if let Some(seed) = &reply.title_request {
            self.generate_title(client, seed).await?;
        }
        Ok(reply)
    }

    /// Like [`Self::send`], but YouTube searches and links are answered by `videos`.
    ///
    /// Video replies are markdown (results or video details plus an analysis)
    /// and never fail; lookup failures become apologetic replies. They do not
    /// request a generated title.
    ///
    /// # Errors
    /// Same as [`Self::send`].
    pub async fn send_with_videos(
        &mut self,
        client: &dyn CompletionClient,
        videos: &dyn VideoClient,
        text: &str,
    ) -> ChatResult<Reply> {
        let Some(intent) = detect_intent(text) else {
            return self.send(client, text).await;
        };

        self.begin_exchange(text)?;
        self.notice(
            NoticeLevel::Info,
            match intent {
                VideoIntent::Search { .. } => "Searching YouTube...",
                VideoIntent::Analyze { .. } => "Analyzing YouTube video...",
            },
        );

        let outcome = answer(
            client,
            videos,
            &intent,
            &self.settings.model,
            self.config.video.max_results,
        )
        .await;
        match outcome.status {
            AnswerStatus::Complete => {
                self.notice(NoticeLevel::Success, "YouTube request completed");
            }
            AnswerStatus::NotFound => debug!("Video request found nothing: {intent:?}"),
            AnswerStatus::Failed => self.notice(NoticeLevel::Error, "YouTube request failed"),
        }

        let id = self.end_exchange()?;
        self.deliver(&id, outcome.content, ReplySource::Video)
    }

    /// Ask for a generated title and apply it while the heuristic name is still in place.
    ///
    /// Returns the applied title. Collaborator failures keep the heuristic name.
    ///
    /// # Errors
    /// Returns an error only if persisting the new name fails.
    pub async fn generate_title(
        &mut self,
        client: &dyn CompletionClient,
        seed: &TitleSeed,
    ) -> ChatResult<Option<String>> {
        let generated = title::generate_title(client, seed, &self.settings.model).await;
        let title = match generated {
            Ok(title) => title,
            Err(err) => {
                warn!(
                    "Title generation failed for {}: {err}; keeping the current name",
                    seed.conversation_id
                );
                return Ok(None);
            }
        };

        let still_heuristic = self
            .repository
            .find(&seed.conversation_id)
            .is_some_and(|c| c.naming == NamingState::Named);
        if !still_heuristic {
            debug!(
                "Ignoring generated title for {}: name already settled",
                seed.conversation_id
            );
            return Ok(None);
        }

        self.repository.rename(&seed.conversation_id, &title)?;
        self.emit(ChatEvent::ConversationRenamed {
            id: seed.conversation_id.clone(),
            name: title.clone(),
        });
        Ok(Some(title))
    }

    /// Rename a conversation. Blank names become "Unnamed Conversation".
    ///
    /// # Errors
    /// [`ChatError::ConversationNotFound`] for an unknown id, or a store error.
    pub fn rename(&mut self, id: &ConversationId, name: &str) -> ChatResult<String> {
        let name = normalize_user_name(name);

        if let Some(draft) = self.pending.as_mut().filter(|p| &p.id == id) {
            draft.name.clone_from(&name);
            draft.naming = NamingState::Renamed;
        } else if !self.repository.rename(id, &name)? {
            return Err(ChatError::ConversationNotFound(id.clone()));
        }

        self.emit(ChatEvent::ConversationRenamed {
            id: id.clone(),
            name: name.clone(),
        });
        Ok(name)
    }

    /// Edit a message of the active conversation.
    ///
    /// Editing a user message rewinds the history to it and returns the
    /// request to resend, with the typing state set.
    ///
    /// # Errors
    /// [`ChatError::EmptyMessage`], [`ChatError::RequestInFlight`], or a store error.
    pub fn edit(&mut self, target: EditTarget, text: &str) -> ChatResult<EditOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.context.is_in_flight() {
            return Err(ChatError::RequestInFlight);
        }

        match apply_edit(
            &mut self.repository,
            &mut self.context,
            target,
            text,
            now_ms(),
        )? {
            RewindOutcome::Truncated { len, .. } => {
                if let Some(id) = self.context.current_id().cloned() {
                    self.emit(ChatEvent::HistoryRewound {
                        conversation_id: id,
                        len,
                    });
                }
                self.context.begin_request()?;
                self.emit(ChatEvent::TypingChanged { active: true });
                Ok(EditOutcome::Resend(self.outbound_request()))
            }
            RewindOutcome::Cosmetic { .. } => Ok(EditOutcome::Cosmetic),
            RewindOutcome::NotFound => Ok(EditOutcome::NotFound),
        }
    }

    /// Edit a message and, when history was rewound, fetch the new reply.
    ///
    /// # Errors
    /// Same as [`Self::edit`] and [`Self::complete`].
    pub async fn edit_and_resend(
        &mut self,
        client: &dyn CompletionClient,
        target: EditTarget,
        text: &str,
    ) -> ChatResult<Option<Reply>> {
        let EditOutcome::Resend(request) = self.edit(target, text)? else {
            return Ok(None);
        };
        let result = client.complete(&request).await;
        self.complete(result).map(Some)
    }

    /// Delete a conversation. Deleting the active one opens a fresh draft.
    ///
    /// Returns `false` for an unknown id.
    ///
    /// # Errors
    /// Returns an error if the store cannot be updated.
    pub fn delete(&mut self, id: &ConversationId) -> ChatResult<bool> {
        if self.pending.as_ref().is_some_and(|p| &p.id == id) {
            self.pending = None;
            self.new_conversation();
            return Ok(true);
        }

        let was_active = self.context.current_id() == Some(id);
        if !self.repository.delete(id)? {
            return Ok(false);
        }
        self.emit(ChatEvent::ConversationDeleted { id: id.clone() });

        if was_active {
            self.forget_active()?;
            self.new_conversation();
        }
        self.notice(NoticeLevel::Success, "Conversation deleted");
        Ok(true)
    }

    /// Delete every conversation and open a fresh draft.
    ///
    /// # Errors
    /// Returns an error if the store cannot be updated.
    pub fn clear_all(&mut self) -> ChatResult<()> {
        self.repository.clear_all()?;
        self.forget_active()?;
        self.pending = None;
        self.emit(ChatEvent::HistoryCleared);
        self.new_conversation();
        self.notice(NoticeLevel::Success, "All conversations cleared");
        Ok(())
    }

    /// Conversations whose name or content contains `term`.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        self.repository.search(term)
    }

    /// Markdown transcript of a conversation.
    ///
    /// # Errors
    /// [`ChatError::ConversationNotFound`] for an unknown id.
    pub fn export_markdown(&self, id: &ConversationId) -> ChatResult<String> {
        self.find(id)
            .map(|c| c.to_markdown(&self.config.session.assistant_label))
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))
    }

    /// Follow-up suggestions for the active conversation. Never fails.
    pub async fn suggestions(&self, client: &dyn CompletionClient) -> Vec<String> {
        suggest(client, &self.settings.model, self.context.entries()).await
    }

    fn save_blob<T: Serialize>(&self, key: &str, value: &T) -> ChatResult<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }

    /// Persist new settings and apply the message limit and history flag.
    ///
    /// A new limit applies to later appends only.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn update_settings(&mut self, settings: ChatSettings) -> ChatResult<()> {
        self.save_blob(&self.config.storage.keys.settings, &settings)?;

        let enable_history = settings.save_history && !self.settings.save_history;
        self.repository
            .set_message_limit(settings.effective_message_limit());
        self.repository.set_save_history(settings.save_history);
        self.settings = settings;

        if enable_history {
            self.repository.save()?;
            if let Some(id) = self.current_id().filter(|id| self.repository.contains(id)) {
                self.persist_active(id)?;
            }
        }
        self.notice(NoticeLevel::Success, "Settings saved");
        Ok(())
    }

    /// Restore and persist default settings.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn reset_settings(&mut self) -> ChatResult<()> {
        self.update_settings(ChatSettings::default())
    }

    /// Persist a new personality; it applies from the next outbound request.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn update_personality(&mut self, personality: Personality) -> ChatResult<()> {
        self.save_blob(&self.config.storage.keys.personality, &personality)?;
        self.personality = personality;
        self.notice(NoticeLevel::Success, "Personality saved");
        Ok(())
    }

    /// Find a stored conversation or the pending draft.
    #[must_use]
    pub fn find(&self, id: &ConversationId) -> Option<&Conversation> {
        self.pending
            .as_ref()
            .filter(|p| &p.id == id)
            .or_else(|| self.repository.find(id))
    }

    /// Active conversation, stored or pending.
    #[must_use]
    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current_id().and_then(|id| self.find(id))
    }

    /// Id of the active conversation.
    #[must_use]
    pub const fn current_id(&self) -> Option<&ConversationId> {
        self.context.current_id()
    }

    /// Whether the active conversation is an unsaved draft.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| Some(&p.id) == self.current_id())
    }

    /// Whether a reply is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.context.is_in_flight()
    }

    /// Stored conversations, most recently created first.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        self.repository.conversations()
    }

    /// Session mirror.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Current personality.
    #[must_use]
    pub const fn personality(&self) -> &Personality {
        &self.personality
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }
}

fn load_or_notify<T: serde::de::DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
    observer: &dyn ChatObserver,
    notice: &str,
) -> T {
    let loaded = read_json::<T>(store, key);
    if matches!(loaded, Loaded::Corrupt(_)) {
        observer.notify(&ChatEvent::notice(NoticeLevel::Warning, notice));
    }
    loaded.or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::session::events::EventLog;
    use crate::chat::storage::kv::MemoryStore;
    use crate::llm::completion::CompletionResult;
    use crate::llm::fallback::FALLBACK_SUFFIX;
    use crate::video::{VideoDetails, VideoError, VideoResult, VideoSummary};

    /// Pops scripted replies; title requests (20-token budget) get `title`.
    struct ScriptedClient {
        replies: Mutex<VecDeque<CompletionResult<String>>>,
        title: Option<&'static str>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<CompletionResult<String>>, title: Option<&'static str>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                title,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn replying(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok((*r).to_string())).collect(), None)
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            if request.max_tokens == 20 {
                return self
                    .title
                    .map(str::to_string)
                    .ok_or_else(|| CompletionError::Transport("title offline".to_string()));
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
        }
    }

    fn open(store: &Arc<MemoryStore>) -> (ChatEngine, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let engine = ChatEngine::open(ChatConfig::default(), store.clone(), log.clone()).unwrap();
        (engine, log)
    }

    fn keys() -> crate::chat::core::config::StorageKeys {
        ChatConfig::default().storage.keys
    }

    fn evictions(events: &[ChatEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ChatEvent::MessagesEvicted { .. }))
            .count()
    }

    #[test]
    fn test_new_conversation_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let (engine, log) = open(&store);

        assert!(engine.is_pending());
        assert!(store.is_empty());
        assert!(engine.conversations().is_empty());
        let current = engine.current_conversation().unwrap();
        assert_eq!(current.messages.len(), 1);
        assert_eq!(current.messages[0].role, Role::Assistant);
        assert!(current.name.starts_with("New Chat ("));
        assert!(matches!(
            log.drain().as_slice(),
            [ChatEvent::ConversationOpened { pending: true, .. }]
        ));
    }

    #[tokio::test]
    async fn test_first_message_commits_with_heuristic_then_generated_title() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::new(vec![Ok("Hi!".to_string())], Some("\"Greeting Chat\""));

        let reply = engine
            .send(&client, "Hello there friend how are you today")
            .await
            .unwrap();

        assert_eq!(reply.source, ReplySource::Completion);
        assert!(reply.title_request.is_some());
        assert!(!engine.is_pending());
        assert_eq!(engine.conversations().len(), 1);
        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.name, "Greeting Chat");
        assert_eq!(convo.naming, NamingState::Renamed);
        assert_eq!(convo.messages.len(), 3);

        let events = log.drain();
        assert!(events.contains(&ChatEvent::ConversationCommitted {
            id: convo.id.clone(),
            name: "Hello there friend how are".to_string(),
        }));
        assert!(store.get(&keys().conversations).unwrap().is_some());
        assert_eq!(
            store.get(&keys().active_conversation).unwrap().as_deref(),
            Some(convo.id.as_str())
        );
    }

    #[tokio::test]
    async fn test_outbound_request_carries_system_prompt_and_history() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);

        let request = engine.submit("  What is Rust?  ").unwrap();
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.last_user_content(), Some("What is Rust?"));
        assert_eq!(request.max_tokens, 800);
        assert_eq!(request.top_p, Some(1.0));
        assert_eq!(request.model, engine.settings().model);
    }

    #[tokio::test]
    async fn test_title_failure_keeps_heuristic_name() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        let client = ScriptedClient::replying(&["Sure."]);

        engine.send(&client, "plan a trip to Lisbon").await.unwrap();
        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.name, "plan a trip to Lisbon");
        assert_eq!(convo.naming, NamingState::Named);
    }

    #[tokio::test]
    async fn test_user_rename_survives_reload_and_late_title() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        let request = engine.submit("hi").unwrap();
        assert_eq!(request.last_user_content(), Some("hi"));
        let reply = engine.complete(Ok("hello".to_string())).unwrap();
        let seed = reply.title_request.unwrap();

        let id = engine.current_id().cloned().unwrap();
        assert_eq!(engine.rename(&id, "Greeting").unwrap(), "Greeting");

        let client = ScriptedClient::new(Vec::new(), Some("Late Title"));
        assert_eq!(engine.generate_title(&client, &seed).await.unwrap(), None);
        drop(engine);

        let (reopened, _) = open(&store);
        let convo = reopened.current_conversation().unwrap();
        assert_eq!(convo.id, id);
        assert_eq!(convo.name, "Greeting");
        let contents: Vec<_> = convo.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            [
                ChatConfig::default().session.welcome_message.as_str(),
                "hi",
                "hello"
            ]
        );
    }

    #[tokio::test]
    async fn test_message_cap_emits_one_notice_per_overflow() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&keys().settings, r#"{"messageLimit":3}"#)
            .unwrap();
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::replying(&["r1", "r2"]);

        engine.send(&client, "one").await.unwrap();
        assert_eq!(evictions(&log.drain()), 0);

        engine.send(&client, "two").await.unwrap();
        let events = log.drain();
        assert_eq!(evictions(&events), 2);
        let notices = events
            .iter()
            .filter(|e| matches!(e, ChatEvent::Notice { level: NoticeLevel::Info, .. }))
            .count();
        assert_eq!(notices, 2);

        let convo = engine.current_conversation().unwrap();
        let contents: Vec<_> = convo.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["r1", "two", "r2"]);
        assert!(engine.context().mirrors(convo));
    }

    #[tokio::test]
    async fn test_edit_first_of_two_rewinds_before_resend() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::replying(&["a1", "a2"]);
        engine.send(&client, "q1").await.unwrap();
        engine.send(&client, "q2").await.unwrap();
        log.drain();

        let outcome = engine.edit(EditTarget::UserOrdinal(0), "q1 again").unwrap();
        let EditOutcome::Resend(request) = outcome else {
            panic!("expected a resend");
        };
        assert!(engine.is_in_flight());
        assert_eq!(request.last_user_content(), Some("q1 again"));
        assert!(request.messages.iter().all(|m| m.content != "q2"));

        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.messages.len(), 2);
        assert!(log
            .drain()
            .iter()
            .any(|e| matches!(e, ChatEvent::HistoryRewound { len: 2, .. })));

        let reply = engine.complete(Ok("a1 again".to_string())).unwrap();
        assert_eq!(reply.content, "a1 again");
        assert_eq!(engine.current_conversation().unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_assistant_edit_is_cosmetic() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        let client = ScriptedClient::replying(&["a1"]);
        let reply = engine.send(&client, "q1").await.unwrap();

        let outcome = engine
            .edit(EditTarget::Message(reply.message_id), "rewritten")
            .unwrap();
        assert_eq!(outcome, EditOutcome::Cosmetic);
        assert!(!engine.is_in_flight());
        assert_eq!(engine.current_conversation().unwrap().messages[2].content, "a1");
    }

    #[tokio::test]
    async fn test_completion_failure_appends_fallback() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::new(
            vec![Err(CompletionError::Status {
                code: 500,
                body: "boom".to_string(),
            })],
            Some("Never Used"),
        );

        let reply = engine.send(&client, "are you there").await.unwrap();
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(reply.content.ends_with(FALLBACK_SUFFIX));
        assert!(reply.title_request.is_none());
        assert!(!engine.is_in_flight());

        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.messages.last().unwrap().content, reply.content);
        assert_eq!(convo.name, "are you there");
        assert!(log.drain().iter().any(|e| matches!(
            e,
            ChatEvent::Notice {
                level: NoticeLevel::Error,
                ..
            }
        )));
    }

    #[test]
    fn test_second_submission_is_rejected_while_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);

        engine.submit("first").unwrap();
        assert!(matches!(engine.submit("second"), Err(ChatError::RequestInFlight)));
        assert!(matches!(
            engine.edit(EditTarget::UserOrdinal(0), "x"),
            Err(ChatError::RequestInFlight)
        ));

        engine.complete(Ok("done".to_string())).unwrap();
        assert!(engine.submit("second").is_ok());
    }

    #[test]
    fn test_blank_submission_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        assert!(matches!(engine.submit("   "), Err(ChatError::EmptyMessage)));
        assert!(engine.is_pending());
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_active_opens_new_draft() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        engine.submit("keep me").unwrap();
        engine.complete(Ok("ok".to_string())).unwrap();
        let id = engine.current_id().cloned().unwrap();

        assert!(engine.delete(&id).unwrap());
        assert!(engine.is_pending());
        assert!(engine.conversations().is_empty());
        assert_eq!(store.get(&keys().active_conversation).unwrap(), None);
        assert!(log.drain().contains(&ChatEvent::ConversationDeleted { id: id.clone() }));
        assert!(!engine.delete(&id).unwrap());
    }

    #[test]
    fn test_clear_all_removes_history() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine.submit("one").unwrap();
        engine.complete(Ok("r".to_string())).unwrap();

        engine.clear_all().unwrap();
        assert!(engine.conversations().is_empty());
        assert!(engine.is_pending());
        assert_eq!(store.get(&keys().conversations).unwrap(), None);
    }

    #[test]
    fn test_reopen_falls_back_to_most_recent() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine.submit("first topic").unwrap();
        engine.complete(Ok("r".to_string())).unwrap();
        let id = engine.current_id().cloned().unwrap();
        drop(engine);

        store
            .set(&keys().active_conversation, "id-does-not-exist")
            .unwrap();
        let (reopened, _) = open(&store);
        assert_eq!(reopened.current_id(), Some(&id));
    }

    #[test]
    fn test_corrupt_settings_fall_back_with_notice() {
        let store = Arc::new(MemoryStore::new());
        store.set(&keys().settings, "{not json").unwrap();
        let (engine, log) = open(&store);

        assert_eq!(engine.settings(), &ChatSettings::default());
        assert!(log.drain().iter().any(|e| matches!(
            e,
            ChatEvent::Notice {
                level: NoticeLevel::Warning,
                ..
            }
        )));
    }

    #[test]
    fn test_history_disabled_persists_nothing_but_settings() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine
            .update_settings(ChatSettings {
                save_history: false,
                ..ChatSettings::default()
            })
            .unwrap();

        engine.submit("secret").unwrap();
        engine.complete(Ok("ok".to_string())).unwrap();
        assert_eq!(engine.conversations().len(), 1);
        assert_eq!(store.get(&keys().conversations).unwrap(), None);
        assert_eq!(store.get(&keys().active_conversation).unwrap(), None);
        assert!(store.get(&keys().settings).unwrap().is_some());
    }

    #[test]
    fn test_rename_blank_and_export() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine.submit("hello").unwrap();
        engine.complete(Ok("hi".to_string())).unwrap();
        let id = engine.current_id().cloned().unwrap();

        assert_eq!(engine.rename(&id, "  ").unwrap(), "Unnamed Conversation");
        let markdown = engine.export_markdown(&id).unwrap();
        assert!(markdown.starts_with("# Unnamed Conversation\n"));
        assert!(markdown.contains("## You\nhello"));
        assert!(markdown.contains("## Aziona AI\nhi"));

        assert_eq!(engine.search("HELLO").len(), 1);
        assert!(engine.search("absent").is_empty());
        assert!(matches!(
            engine.export_markdown(&ConversationId::new()),
            Err(ChatError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_pending_rename_survives_commit() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        let id = engine.current_id().cloned().unwrap();
        engine.rename(&id, "Chosen").unwrap();
        assert!(store.is_empty());

        engine.submit("some first words here").unwrap();
        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.name, "Chosen");
        assert_eq!(convo.naming, NamingState::Renamed);
    }

    #[test]
    fn test_personality_changes_system_prompt() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine
            .update_personality(Personality {
                kind: crate::chat::core::settings::PersonalityKind::Developer,
                custom_instructions: "Prefer Rust.".to_string(),
            })
            .unwrap();

        let request = engine.submit("sort a list").unwrap();
        let system = &request.messages[0].content;
        assert!(system.starts_with("You are Aziona, a technical AI assistant"));
        assert!(system.ends_with("Prefer Rust."));
    }

    #[tokio::test]
    async fn test_suggestions_use_collaborator_reply() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = open(&store);
        let client = ScriptedClient::replying(&[r#"["A?","B?","C?","D?"]"#]);

        let suggestions = engine.suggestions(&client).await;
        assert_eq!(suggestions, ["A?", "B?", "C?", "D?"]);
    }

    #[test]
    fn test_late_reply_lands_in_new_draft() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        engine.submit("first question").unwrap();
        let first = engine.current_id().cloned().unwrap();

        let draft = engine.new_conversation();
        let reply = engine.complete(Ok("late answer".to_string())).unwrap();

        assert!(engine.is_pending());
        assert_eq!(reply.title_request, None);
        let current = engine.current_conversation().unwrap();
        assert_eq!(current.id, draft);
        assert_eq!(current.messages.last().unwrap().content, "late answer");
        assert!(engine.context().mirrors(current));
        assert_eq!(engine.find(&first).unwrap().messages.len(), 2);

        engine.submit("second question").unwrap();
        let committed = engine.find(&draft).unwrap();
        assert_eq!(committed.name, "second question");
        let contents: Vec<_> = committed.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&contents[1..], ["late answer", "second question"]);
    }

    /// Video collaborator returning one fixed hit, or failing.
    struct ScriptedVideos {
        online: bool,
    }

    #[async_trait]
    impl VideoClient for ScriptedVideos {
        async fn search(&self, query: &str, _max_results: u32) -> VideoResult<Vec<VideoSummary>> {
            if !self.online {
                return Err(VideoError::Transport("offline".to_string()));
            }
            Ok(vec![VideoSummary {
                id: "v1".to_string(),
                title: format!("All about {query}"),
                channel: "Rustacean".to_string(),
                description: String::new(),
                thumbnail_url: None,
            }])
        }

        async fn video_details(&self, _video_id: &str) -> VideoResult<Option<VideoDetails>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_video_search_is_answered_by_video_client() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::replying(&["Watch the first one."]);

        let reply = engine
            .send_with_videos(&client, &ScriptedVideos { online: true }, "find lifetimes videos")
            .await
            .unwrap();

        assert_eq!(reply.source, ReplySource::Video);
        assert_eq!(reply.title_request, None);
        assert!(reply.content.contains("[All about lifetimes]"));
        assert!(reply.content.ends_with("Watch the first one."));
        assert!(!engine.is_in_flight());

        let convo = engine.current_conversation().unwrap();
        assert_eq!(convo.name, "find lifetimes videos");
        assert_eq!(convo.messages.len(), 3);
        assert_eq!(convo.messages[2].role, Role::Assistant);

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 500);

        let events = log.drain();
        assert!(events.contains(&ChatEvent::notice(NoticeLevel::Info, "Searching YouTube...")));
        assert!(events.contains(&ChatEvent::TypingChanged { active: false }));
    }

    #[tokio::test]
    async fn test_video_failures_become_replies() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, log) = open(&store);
        let client = ScriptedClient::replying(&[]);

        let reply = engine
            .send_with_videos(&client, &ScriptedVideos { online: false }, "show me cat videos")
            .await
            .unwrap();
        assert_eq!(reply.content, crate::video::answer::SEARCH_FAILED);
        assert!(log
            .drain()
            .contains(&ChatEvent::notice(NoticeLevel::Error, "YouTube request failed")));

        let reply = engine
            .send_with_videos(&client, &ScriptedVideos { online: true }, "see youtu.be/gone")
            .await
            .unwrap();
        assert_eq!(reply.content, crate::video::answer::DETAILS_UNAVAILABLE);
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plain_message_skips_video_client() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _) = open(&store);
        let client = ScriptedClient::replying(&["Ownership is..."]);

        let reply = engine
            .send_with_videos(&client, &ScriptedVideos { online: false }, "explain ownership")
            .await
            .unwrap();
        assert_eq!(reply.source, ReplySource::Completion);
        assert_eq!(reply.content, "Ownership is...");
    }
}
