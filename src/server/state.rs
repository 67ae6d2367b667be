//! Application state shared across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::chat::core::config::{ChatConfig, ServerConfig};
use crate::chat::core::errors::ChatResult;

/// Upstream request timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared application state.
pub struct AppState {
    /// HTTP client for upstream calls.
    pub http: reqwest::Client,
    /// Upstream URLs and keys.
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ServerConfig) -> ChatResult<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Arc::new(Self { http, config }))
    }

    /// Create the state from `NOVA_*`, `GROQ_API_KEY` and `YOUTUBE_API_KEY`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn from_env() -> ChatResult<Arc<Self>> {
        let config = ChatConfig::from_env();
        config.validate()?;
        if config.server.completion_api_key.is_none() {
            tracing::warn!("GROQ_API_KEY is not set; /api/chat will answer 500");
        }
        if config.server.youtube_api_key.is_none() {
            tracing::warn!("YOUTUBE_API_KEY is not set; /api/youtube will answer 500");
        }
        Self::new(config.server)
    }
}
