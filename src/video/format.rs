//! Markdown rendering of search hits and video details.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::chat::core::message::preview;
use crate::video::client::{VideoDetails, VideoSummary, watch_url};

const SEARCH_DESCRIPTION_CHARS: usize = 100;
const DETAILS_DESCRIPTION_CHARS: usize = 500;

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").ok())
        .as_ref()
}

/// Render an ISO-8601 duration (`PT1H2M3S`) as `1:02:03`.
///
/// Absent components are skipped (`PT45S` is `45`, `PT4M13S` is `4:13`).
/// Inputs that are not `PT` durations are returned unchanged.
#[must_use]
pub fn format_duration(iso: &str) -> String {
    let Some(caps) = duration_pattern().and_then(|re| re.captures(iso)) else {
        return iso.to_string();
    };

    let parts: Vec<&str> = (1..=3)
        .filter_map(|idx| caps.get(idx).map(|m| m.as_str()))
        .collect();
    if parts.is_empty() {
        return iso.to_string();
    }

    parts
        .iter()
        .enumerate()
        .map(|(idx, part)| {
            if idx == 0 {
                part.parse::<u64>()
                    .map_or_else(|_| (*part).to_string(), |n| n.to_string())
            } else {
                format!("{part:0>2}")
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// `1234567` as `1,234,567`.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Numbered list of search hits with channel, description and thumbnail.
#[must_use]
pub fn format_search_results(videos: &[VideoSummary]) -> String {
    if videos.is_empty() {
        return "No videos found.".to_string();
    }

    let mut out = String::from("## 🎥 YouTube Search Results\n\n");
    for (idx, video) in videos.iter().enumerate() {
        let _ = writeln!(out, "### {}. [{}]({})", idx + 1, video.title, watch_url(&video.id));
        let _ = writeln!(out, "**Channel:** {}", video.channel);
        let _ = writeln!(
            out,
            "**Description:** {}",
            preview(&video.description, SEARCH_DESCRIPTION_CHARS)
        );
        if let Some(thumbnail) = &video.thumbnail_url {
            let _ = writeln!(out, "![Thumbnail]({thumbnail})");
        }
        out.push('\n');
    }
    out
}

/// Metadata sheet of one video.
#[must_use]
pub fn format_video_details(video: &VideoDetails) -> String {
    let published = video
        .published_at
        .map_or_else(|| "Unknown".to_string(), |at| at.format("%Y-%m-%d").to_string());
    let tags = if video.tags.is_empty() {
        "No tags".to_string()
    } else {
        video.tags.join(", ")
    };

    let mut out = String::from("## 📊 Video Analysis\n\n");
    let _ = writeln!(out, "**Title:** {}", video.title);
    let _ = writeln!(out, "**Channel:** {}", video.channel);
    let _ = writeln!(out, "**Published:** {published}");
    let _ = writeln!(out, "**Duration:** {}", format_duration(&video.duration));
    let _ = writeln!(out, "**Views:** {}", group_thousands(video.views));
    let _ = writeln!(out, "**Likes:** {}", group_thousands(video.likes));
    let _ = writeln!(out, "**Comments:** {}\n", group_thousands(video.comments));
    let _ = writeln!(
        out,
        "**Description:**\n{}\n",
        preview(&video.description, DETAILS_DESCRIPTION_CHARS)
    );
    let _ = writeln!(out, "**Tags:** {tags}");
    out
}
