//! Chat completion contract and its HTTP implementation.
//!
//! Requests use the OpenAI-style body (`model`, `messages`, sampling
//! parameters). Replies are `{choices:[{message:{content}}]}` or an `{error}`
//! object, which may be a string or `{message}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::core::config::LlmConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::message::{Role, preview};

/// One message of an outbound request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Author role.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl CompletionMessage {
    /// Create a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Outbound chat completion request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model name.
    pub model: String,
    /// System prompt plus dialogue, oldest first.
    pub messages: Vec<CompletionMessage>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Reply token budget.
    pub max_tokens: u32,
    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Repetition penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl CompletionRequest {
    /// Request with the default sampling parameters (temperature 0.7, 800 tokens).
    pub fn new(model: impl Into<String>, messages: Vec<CompletionMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 800,
            top_p: None,
            frequency_penalty: None,
        }
    }

    /// Request using the sampling parameters of `config`.
    pub fn from_config(
        model: impl Into<String>,
        messages: Vec<CompletionMessage>,
        config: &LlmConfig,
    ) -> Self {
        Self::new(model, messages)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_top_p(config.top_p)
    }

    /// Set the temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set `top_p`.
    #[must_use]
    pub const fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the frequency penalty.
    #[must_use]
    pub const fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    /// Content of the last user message, if any.
    #[must_use]
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Failure of a completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("completion endpoint returned {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, as text.
        body: String,
    },
    /// The endpoint reported an error in the body.
    #[error("completion api error: {0}")]
    Api(String),
    /// The response had no usable content.
    #[error("malformed completion response")]
    Malformed,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience result alias for completion calls.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Produces assistant text for a request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String>;
}

/// Extract the reply text from a completion response body.
///
/// # Errors
/// [`CompletionError::Api`] when the body carries an `error`,
/// [`CompletionError::Malformed`] when no content is present.
pub fn parse_completion(body: &Value) -> CompletionResult<String> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(CompletionError::Api(message));
    }

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(CompletionError::Malformed)
}

/// [`CompletionClient`] posting JSON over HTTP.
#[derive(Clone, Debug)]
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a URL or the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> ChatResult<Self> {
        url::Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Endpoint requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<String> {
        debug!(
            "Posting {} messages to {} (model {}), last user turn: {:?}",
            request.messages.len(),
            self.endpoint,
            request.model,
            request.last_user_content().map(|c| preview(c, 60))
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion endpoint returned {status}");
            return Err(CompletionError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| CompletionError::Malformed)?;
        parse_completion(&body)
    }
}
