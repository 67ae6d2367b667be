//! YouTube Data API request parsing and URL building.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default `maxResults` for searches.
pub const DEFAULT_MAX_RESULTS: u32 = 10;

const fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

/// Body (or query string) of a `/api/youtube` call.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeRequest {
    /// `search`, `videoDetails` or `transcript`.
    #[serde(default)]
    pub action: Option<String>,
    /// Search terms.
    #[serde(default)]
    pub query: Option<String>,
    /// Video id for details.
    #[serde(default)]
    pub video_id: Option<String>,
    /// Search page size.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for YoutubeRequest {
    fn default() -> Self {
        Self {
            action: None,
            query: None,
            video_id: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// A validated YouTube action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum YoutubeAction {
    /// Video search.
    Search {
        /// Search terms.
        query: String,
        /// Page size.
        max_results: u32,
    },
    /// Snippet, statistics and content details of one video.
    VideoDetails {
        /// Video id.
        video_id: String,
    },
    /// Transcripts are not available through the Data API.
    Transcript,
}

/// Why a request could not be turned into an action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum YoutubeRequestError {
    /// Unknown or missing `action`.
    #[error("Invalid action")]
    InvalidAction,
    /// A field the action needs is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, YoutubeRequestError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(YoutubeRequestError::MissingField(field))
}

impl YoutubeRequest {
    /// Validate the request.
    ///
    /// # Errors
    /// See [`YoutubeRequestError`].
    pub fn action(&self) -> Result<YoutubeAction, YoutubeRequestError> {
        match self.action.as_deref() {
            Some("search") => Ok(YoutubeAction::Search {
                query: required(self.query.as_deref(), "query")?,
                max_results: self.max_results,
            }),
            Some("videoDetails") => Ok(YoutubeAction::VideoDetails {
                video_id: required(self.video_id.as_deref(), "videoId")?,
            }),
            Some("transcript") => Ok(YoutubeAction::Transcript),
            _ => Err(YoutubeRequestError::InvalidAction),
        }
    }
}

/// Build the Data API URL for `action`; `None` for actions with no upstream call.
///
/// # Errors
/// Returns an error if `base` is not a valid URL.
pub fn build_url(
    base: &str,
    action: &YoutubeAction,
    api_key: &str,
) -> Result<Option<Url>, url::ParseError> {
    let base = base.trim_end_matches('/');
    let url = match action {
        YoutubeAction::Search { query, max_results } => {
            let mut url = Url::parse(&format!("{base}/search"))?;
            url.query_pairs_mut()
                .append_pair("part", "snippet")
                .append_pair("q", query)
                .append_pair("type", "video")
                .append_pair("maxResults", &max_results.to_string())
                .append_pair("key", api_key);
            url
        }
        YoutubeAction::VideoDetails { video_id } => {
            let mut url = Url::parse(&format!("{base}/videos"))?;
            url.query_pairs_mut()
                .append_pair("part", "snippet,statistics,contentDetails")
                .append_pair("id", video_id)
                .append_pair("key", api_key);
            url
        }
        YoutubeAction::Transcript => return Ok(None),
    };
    Ok(Some(url))
}
