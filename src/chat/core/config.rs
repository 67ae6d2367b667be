//! Configuration for the chat core, its collaborators and the proxy server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Page size ceiling of the YouTube Data API search endpoint.
pub const MAX_VIDEO_RESULTS: u32 = 50;

/// Proxy port when `NOVA_PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Completion collaborator settings.
    pub llm: LlmConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Session behaviour settings.
    pub session: SessionConfig,
    /// Proxy server settings.
    pub server: ServerConfig,
    /// Video collaborator settings.
    pub video: VideoConfig,
}

impl ChatConfig {
    /// Build the default configuration, then apply `NOVA_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("NOVA_LLM_ENDPOINT") {
            config.llm.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("NOVA_LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("NOVA_VIDEO_ENDPOINT") {
            config.video.endpoint = endpoint;
        }
        if let Ok(path) = std::env::var("NOVA_DB_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(port) = std::env::var("NOVA_PORT").ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(url) = std::env::var("NOVA_COMPLETION_URL") {
            config.server.completion_url = url;
        }
        config.server.completion_api_key = std::env::var("GROQ_API_KEY").ok();
        config.server.youtube_api_key = std::env::var("YOUTUBE_API_KEY").ok();

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        Url::parse(&self.llm.endpoint)?;
        Url::parse(&self.server.completion_url)?;
        Url::parse(&self.server.youtube_api_base)?;
        Url::parse(&self.video.endpoint)?;

        if self.llm.max_tokens == 0 {
            return Err(ChatError::InvalidConfig(
                "llm.max_tokens must be > 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ChatError::InvalidConfig(
                "llm.temperature must be within 0.0..=2.0".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "llm.timeout_secs must be > 0".to_string(),
            ));
        }

        if !(1..=MAX_VIDEO_RESULTS).contains(&self.video.max_results) {
            return Err(ChatError::InvalidConfig(format!(
                "video.max_results must be within 1..={MAX_VIDEO_RESULTS}"
            )));
        }

        if self.video.timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "video.timeout_secs must be > 0".to_string(),
            ));
        }

        let table = &self.storage.table;
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ChatError::InvalidConfig(format!(
                "storage.table must be a plain identifier, got {table:?}"
            )));
        }

        self.storage.keys.validate()
    }
}

/// Completion collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat completion endpoint (the proxy route by default).
    pub endpoint: String,
    /// Optional bearer token when talking to an upstream directly.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for conversation replies.
    pub temperature: f64,
    /// Token budget for conversation replies.
    pub max_tokens: u32,
    /// Nucleus sampling parameter.
    pub top_p: f64,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/chat".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 800,
            top_p: 1.0,
            timeout_secs: 60,
        }
    }
}

/// Storage keys used in the key-value store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Settings blob.
    pub settings: String,
    /// Personality blob.
    pub personality: String,
    /// Serialized conversation collection.
    pub conversations: String,
    /// Active conversation id.
    pub active_conversation: String,
}

impl StorageKeys {
    fn validate(&self) -> ChatResult<()> {
        let keys = [
            &self.settings,
            &self.personality,
            &self.conversations,
            &self.active_conversation,
        ];
        if keys.iter().any(|k| k.is_empty()) {
            return Err(ChatError::InvalidConfig(
                "storage keys must not be empty".to_string(),
            ));
        }
        for (idx, key) in keys.iter().enumerate() {
            if keys[idx + 1..].contains(key) {
                return Err(ChatError::InvalidConfig(format!(
                    "storage key {key:?} is used twice"
                )));
            }
        }
        Ok(())
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            settings: "nova-settings".to_string(),
            personality: "nova-personality".to_string(),
            conversations: "nova-conversations".to_string(),
            active_conversation: "nova-active-conversation".to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path for the durable store.
    pub sqlite_path: PathBuf,
    /// Key-value table name.
    pub table: String,
    /// Keys inside the store.
    pub keys: StorageKeys,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("nova_chat.sqlite"),
            table: "kv_store".to_string(),
            keys: StorageKeys::default(),
        }
    }
}

/// Session behaviour settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seed message of every new conversation.
    pub welcome_message: String,
    /// Label used for assistant messages in exports.
    pub assistant_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Hello! I'm Aziona, your AI assistant. How can I help you today?"
                .to_string(),
            assistant_label: "Aziona AI".to_string(),
        }
    }
}

/// Proxy server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Upstream chat completion URL.
    pub completion_url: String,
    /// Upstream completion API key.
    #[serde(skip_serializing)]
    pub completion_api_key: Option<String>,
    /// YouTube Data API base URL.
    pub youtube_api_base: String,
    /// YouTube Data API key.
    #[serde(skip_serializing)]
    pub youtube_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            completion_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            completion_api_key: None,
            youtube_api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            youtube_api_key: None,
        }
    }
}

/// Video collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoConfig {
    /// YouTube endpoint (the proxy route by default).
    pub endpoint: String,
    /// Search results shown per query.
    pub max_results: u32,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/youtube".to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = ChatConfig::default();
        config.storage.table = "kv; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let mut config = ChatConfig::default();
        config.storage.keys.personality = config.storage.keys.settings.clone();
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_video_page() {
        let mut config = ChatConfig::default();
        config.video.max_results = 0;
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
        config.video.max_results = MAX_VIDEO_RESULTS + 1;
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = ChatConfig::default();
        config.llm.endpoint = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ChatError::Url(_))));
    }
}
