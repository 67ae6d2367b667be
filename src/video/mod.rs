//! YouTube requests answered inside the chat.
//!
//! - `intent`: spots search requests and YouTube links in user messages
//! - `client`: the video collaborator contract and its proxy-backed client
//! - `format`: markdown for search hits and video details
//! - `answer`: lookup plus analysis, with apologetic replies on failure

pub mod answer;
pub mod client;
pub mod format;
pub mod intent;

pub use answer::{AnswerStatus, VideoAnswer, answer};
pub use client::{
    VideoClient, VideoDetails, VideoError, VideoResult, VideoSummary, YoutubeClient,
    parse_search_results, parse_video_details, watch_url,
};
pub use format::{format_duration, format_search_results, format_video_details, group_thousands};
pub use intent::{VideoIntent, detect_intent, extract_video_id};
