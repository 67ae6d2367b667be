//! Builds the assistant reply for a video request.
//!
//! Lookups go to the video collaborator; the rendered markdown is then handed
//! to the completion collaborator for a short analysis. Every failure turns
//! into an apologetic reply, so a video request never fails outright.

use tracing::{debug, warn};

use crate::chat::core::message::Role;
use crate::llm::completion::{CompletionClient, CompletionMessage, CompletionRequest};
use crate::video::client::{VideoClient, watch_url};
use crate::video::format::{format_search_results, format_video_details};
use crate::video::intent::VideoIntent;

/// System prompt of the analysis request.
pub const ANALYST_PROMPT: &str = "You are Aziona, an AI assistant that helps analyze and discuss \
YouTube content. Provide insightful, helpful analysis and recommendations.";

/// Token budget of the analysis request.
pub const ANALYSIS_MAX_TOKENS: u32 = 500;

/// Stands in for the analysis when the completion call fails.
pub const ANALYSIS_UNAVAILABLE: &str =
    "I apologize, but I couldn't generate an analysis at this time.";

/// Reply when the search itself fails.
pub const SEARCH_FAILED: &str =
    "Sorry, I encountered an error while searching YouTube. Please try again.";

/// Reply when a YouTube link carries no usable video id.
pub const BAD_LINK: &str = "I couldn't extract the video ID from that YouTube URL. \
Please make sure it's a valid YouTube link.";

/// Reply when a video has no details (private, removed or unknown).
pub const DETAILS_UNAVAILABLE: &str =
    "I couldn't retrieve details for that YouTube video. It might be private or unavailable.";

/// Reply when the details lookup fails.
pub const ANALYSIS_FAILED: &str =
    "Sorry, I encountered an error while analyzing that YouTube video. Please try again.";

/// How a video request ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnswerStatus {
    /// Results were found and analysed.
    Complete,
    /// Nothing matched, or the link was unusable.
    NotFound,
    /// The video collaborator failed.
    Failed,
}

/// Reply text for a video request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VideoAnswer {
    /// Markdown appended as the assistant message.
    pub content: String,
    /// Outcome of the lookup.
    pub status: AnswerStatus,
}

impl VideoAnswer {
    fn new(content: impl Into<String>, status: AnswerStatus) -> Self {
        Self {
            content: content.into(),
            status,
        }
    }
}

/// One-shot analysis request for `prompt`.
#[must_use]
pub fn analysis_request(model: &str, prompt: impl Into<String>) -> CompletionRequest {
    CompletionRequest::new(
        model,
        vec![
            CompletionMessage::new(Role::System, ANALYST_PROMPT),
            CompletionMessage::new(Role::User, prompt),
        ],
    )
    .with_temperature(0.7)
    .with_max_tokens(ANALYSIS_MAX_TOKENS)
}

async fn analysis(completion: &dyn CompletionClient, model: &str, prompt: String) -> String {
    match completion.complete(&analysis_request(model, prompt)).await {
        Ok(text) => text,
        Err(err) => {
            warn!("Video analysis request failed: {err}");
            ANALYSIS_UNAVAILABLE.to_string()
        }
    }
}

/// Answer a video request. Never fails.
pub async fn answer(
    completion: &dyn CompletionClient,
    videos: &dyn VideoClient,
    intent: &VideoIntent,
    model: &str,
    max_results: u32,
) -> VideoAnswer {
    match intent {
        VideoIntent::Search { query } => {
            search(completion, videos, query, model, max_results).await
        }
        VideoIntent::Analyze { video_id } => {
            inspect(completion, videos, video_id.as_deref(), model).await
        }
    }
}

async fn search(
    completion: &dyn CompletionClient,
    videos: &dyn VideoClient,
    query: &str,
    model: &str,
    max_results: u32,
) -> VideoAnswer {
    let hits = match videos.search(query, max_results).await {
        Ok(hits) => hits,
        Err(err) => {
            warn!("YouTube search for {query:?} failed: {err}");
            return VideoAnswer::new(SEARCH_FAILED, AnswerStatus::Failed);
        }
    };
    if hits.is_empty() {
        debug!("YouTube search for {query:?} found nothing");
        return VideoAnswer::new(
            format!(
                "I couldn't find any YouTube videos for \"{query}\". Try a different search term."
            ),
            AnswerStatus::NotFound,
        );
    }

    let results = format_search_results(&hits);
    let summary = analysis(
        completion,
        model,
        format!(
            "Based on these YouTube search results for \"{query}\", provide a helpful summary \
and recommendations:\n\n{results}"
        ),
    )
    .await;

    VideoAnswer::new(
        format!("{results}\n\n---\n\n{summary}"),
        AnswerStatus::Complete,
    )
}

async fn inspect(
    completion: &dyn CompletionClient,
    videos: &dyn VideoClient,
    video_id: Option<&str>,
    model: &str,
) -> VideoAnswer {
    let Some(video_id) = video_id else {
        return VideoAnswer::new(BAD_LINK, AnswerStatus::NotFound);
    };

    let details = match videos.video_details(video_id).await {
        Ok(Some(details)) => details,
        Ok(None) => return VideoAnswer::new(DETAILS_UNAVAILABLE, AnswerStatus::NotFound),
        Err(err) => {
            warn!("YouTube details for {video_id} failed: {err}");
            return VideoAnswer::new(ANALYSIS_FAILED, AnswerStatus::Failed);
        }
    };

    let sheet = format_video_details(&details);
    let insights = analysis(
        completion,
        model,
        format!(
            "Analyze this YouTube video and provide insights, key takeaways, and \
recommendations:\n\n{sheet}"
        ),
    )
    .await;

    VideoAnswer::new(
        format!(
            "## 🎥 Video\n\n{}\n\n{sheet}\n\n---\n\n## 🤖 AI Analysis\n\n{insights}",
            watch_url(video_id)
        ),
        AnswerStatus::Complete,
    )
}
