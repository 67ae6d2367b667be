//! YouTube collaborator: contract, result types and the proxy-backed client.
//!
//! The client posts `{action, query | videoId, maxResults}` to the YouTube
//! route of the proxy and walks the Data API v3 payload it relays.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::core::config::VideoConfig;
use crate::chat::core::errors::ChatResult;

/// One search hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSummary {
    /// Video id.
    pub id: String,
    /// Video title.
    pub title: String,
    /// Channel name.
    pub channel: String,
    /// Description snippet.
    pub description: String,
    /// Medium-size thumbnail, when present.
    pub thumbnail_url: Option<String>,
}

/// Snippet, statistics and content details of one video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoDetails {
    /// Video id.
    pub id: String,
    /// Video title.
    pub title: String,
    /// Channel name.
    pub channel: String,
    /// Full description.
    pub description: String,
    /// Upload time.
    pub published_at: Option<DateTime<Utc>>,
    /// ISO-8601 duration such as `PT4M13S`.
    pub duration: String,
    /// View count.
    pub views: u64,
    /// Like count (0 when hidden).
    pub likes: u64,
    /// Comment count (0 when disabled).
    pub comments: u64,
    /// Uploader tags.
    pub tags: Vec<String>,
}

/// Public watch URL of a video.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Failure of a video lookup.
#[derive(Debug, Error)]
pub enum VideoError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("video endpoint returned {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, as text.
        body: String,
    },
    /// The endpoint reported an error in the body.
    #[error("video api error: {0}")]
    Api(String),
    /// The response was not JSON.
    #[error("malformed video response")]
    Malformed,
}

impl From<reqwest::Error> for VideoError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience result alias for video lookups.
pub type VideoResult<T> = Result<T, VideoError>;

/// Looks up YouTube videos.
#[async_trait]
pub trait VideoClient: Send + Sync {
    /// Search videos matching `query`.
    async fn search(&self, query: &str, max_results: u32) -> VideoResult<Vec<VideoSummary>>;

    /// Details of one video; `None` when it is private or does not exist.
    async fn video_details(&self, video_id: &str) -> VideoResult<Option<VideoDetails>>;
}

fn text(value: Option<&Value>, key: &str) -> String {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Statistics arrive as decimal strings; plain numbers are accepted too.
fn count(value: Option<&Value>, key: &str) -> u64 {
    match value.and_then(|v| v.get(key)) {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        Some(v) => v.as_u64().unwrap_or_default(),
        None => 0,
    }
}

fn api_error(body: &Value) -> Option<VideoError> {
    let error = body.get("error").filter(|e| !e.is_null())?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map_or_else(|| error.to_string(), str::to_string);
    Some(VideoError::Api(message))
}

/// Parse a `search` payload. Items without a video id are skipped.
///
/// # Errors
/// [`VideoError::Api`] when the body carries an `error`.
pub fn parse_search_results(body: &Value) -> VideoResult<Vec<VideoSummary>> {
    if let Some(err) = api_error(body) {
        return Err(err);
    }

    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item.pointer("/id/videoId").and_then(Value::as_str)?;
            if id.is_empty() {
                return None;
            }
            let snippet = item.get("snippet");
            Some(VideoSummary {
                id: id.to_string(),
                title: text(snippet, "title"),
                channel: text(snippet, "channelTitle"),
                description: text(snippet, "description"),
                thumbnail_url: snippet
                    .and_then(|s| s.pointer("/thumbnails/medium/url"))
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        })
        .collect())
}

/// Parse a `videoDetails` payload; `None` when `items` is empty.
///
/// # Errors
/// [`VideoError::Api`] when the body carries an `error`.
pub fn parse_video_details(body: &Value) -> VideoResult<Option<VideoDetails>> {
    if let Some(err) = api_error(body) {
        return Err(err);
    }

    let Some(item) = body.pointer("/items/0") else {
        return Ok(None);
    };

    let snippet = item.get("snippet");
    let statistics = item.get("statistics");
    let tags = snippet
        .and_then(|s| s.get("tags"))
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(VideoDetails {
        id: item
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        title: text(snippet, "title"),
        channel: text(snippet, "channelTitle"),
        description: text(snippet, "description"),
        published_at: snippet
            .and_then(|s| s.get("publishedAt"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        duration: text(item.get("contentDetails"), "duration"),
        views: count(statistics, "viewCount"),
        likes: count(statistics, "likeCount"),
        comments: count(statistics, "commentCount"),
        tags,
    }))
}

/// [`VideoClient`] posting to the YouTube route of the proxy.
#[derive(Clone, Debug)]
pub struct YoutubeClient {
    client: Client,
    endpoint: String,
}

impl YoutubeClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a URL or the HTTP client cannot be built.
    pub fn new(config: &VideoConfig) -> ChatResult<Self> {
        url::Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Endpoint lookups are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, body: &Value) -> VideoResult<Value> {
        debug!("Posting {body} to {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Video endpoint returned {status}");
            return Err(VideoError::Status {
                code: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|_| VideoError::Malformed)
    }
}

#[async_trait]
impl VideoClient for YoutubeClient {
    async fn search(&self, query: &str, max_results: u32) -> VideoResult<Vec<VideoSummary>> {
        let body = self
            .post(&json!({"action": "search", "query": query, "maxResults": max_results}))
            .await?;
        parse_search_results(&body)
    }

    async fn video_details(&self, video_id: &str) -> VideoResult<Option<VideoDetails>> {
        let body = self
            .post(&json!({"action": "videoDetails", "videoId": video_id}))
            .await?;
        parse_video_details(&body)
    }
}
