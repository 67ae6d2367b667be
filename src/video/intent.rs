//! Detects messages that ask for YouTube content.
//!
//! A message is a search when it pairs a search verb with a video word
//! ("find videos about borrowing on youtube"). Otherwise any YouTube link makes
//! it an analysis request for the linked video.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

/// What a message asks of the video collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoIntent {
    /// Search videos and summarise the hits.
    Search {
        /// Search terms left once the request wording is stripped.
        query: String,
    },
    /// Analyse the linked video.
    Analyze {
        /// Extracted id; `None` when the link could not be parsed.
        video_id: Option<String>,
    },
}

struct IntentPatterns {
    search: Regex,
    link: Regex,
    video_ids: [Regex; 3],
    verb: Regex,
    topic: Regex,
    lead: Regex,
    spaces: Regex,
}

impl IntentPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            search: Regex::new(r"(?i)(?:search|find|look for|show me).+(?:youtube|videos?)")?,
            link: Regex::new(r"(?:https?://)?(?:www\.)?(?:youtube\.com|youtu\.be)")?,
            video_ids: [
                Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([^&?#\s]+)")?,
                Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/embed/([^&?#\s]+)")?,
                Regex::new(r"(?:https?://)?(?:www\.)?youtu\.be/([^&?#\s]+)")?,
            ],
            verb: Regex::new(r"(?i)\b(?:search|find|look for|show me)\b")?,
            topic: Regex::new(r"(?i)\b(?:on\s+youtube|youtube|videos?)\b")?,
            lead: Regex::new(r"(?i)^(?:for|about)\s+")?,
            spaces: Regex::new(r"\s+")?,
        })
    }

    fn video_id(&self, text: &str) -> Option<String> {
        self.video_ids
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn query(&self, text: &str) -> String {
        let stripped = self.verb.replace(text, "");
        let stripped = self.topic.replace_all(&stripped, " ");
        let stripped = self.spaces.replace_all(stripped.trim(), " ");
        let query = self.lead.replace(&stripped, "");
        let query = query.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if query.is_empty() {
            text.trim().to_string()
        } else {
            query.to_string()
        }
    }

    fn detect(&self, text: &str) -> Option<VideoIntent> {
        if self.search.is_match(text) {
            return Some(VideoIntent::Search {
                query: self.query(text),
            });
        }
        if self.link.is_match(text) {
            return Some(VideoIntent::Analyze {
                video_id: self.video_id(text),
            });
        }
        None
    }
}

fn patterns() -> Option<&'static IntentPatterns> {
    static PATTERNS: OnceLock<Option<IntentPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            IntentPatterns::new()
                .map_err(|e| warn!("Video intent patterns unavailable: {e}"))
                .ok()
        })
        .as_ref()
}

/// Classify a user message; `None` for ordinary chat.
#[must_use]
pub fn detect_intent(text: &str) -> Option<VideoIntent> {
    patterns().and_then(|p| p.detect(text))
}

/// Video id from a `watch?v=`, `embed/` or `youtu.be/` link.
#[must_use]
pub fn extract_video_id(text: &str) -> Option<String> {
    patterns().and_then(|p| p.video_id(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(query: &str) -> Option<VideoIntent> {
        Some(VideoIntent::Search {
            query: query.to_string(),
        })
    }

    #[test]
    fn test_search_requests_are_detected() {
        assert_eq!(
            detect_intent("Search for rust async tutorials on YouTube"),
            search("rust async tutorials")
        );
        assert_eq!(
            detect_intent("show me videos about sourdough"),
            search("sourdough")
        );
        assert_eq!(detect_intent("find lofi youtube"), search("lofi"));
    }

    #[test]
    fn test_bare_request_keeps_whole_message_as_query() {
        assert_eq!(
            detect_intent("find videos on youtube"),
            search("find videos on youtube")
        );
    }

    #[test]
    fn test_links_are_analysis_requests() {
        assert_eq!(
            detect_intent("what is https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42 about?"),
            Some(VideoIntent::Analyze {
                video_id: Some("dQw4w9WgXcQ".to_string())
            })
        );
        assert_eq!(
            detect_intent("summarise youtu.be/abc123 please"),
            Some(VideoIntent::Analyze {
                video_id: Some("abc123".to_string())
            })
        );
        assert_eq!(
            detect_intent("I like youtube.com a lot"),
            Some(VideoIntent::Analyze { video_id: None })
        );
    }

    #[test]
    fn test_search_wins_over_link() {
        assert!(matches!(
            detect_intent("find more videos like https://youtu.be/abc123"),
            Some(VideoIntent::Search { .. })
        ));
    }

    #[test]
    fn test_plain_chat_has_no_intent() {
        assert_eq!(detect_intent("How do lifetimes work?"), None);
        assert_eq!(detect_intent("find the bug in this code"), None);
    }

    #[test]
    fn test_extract_embed_id() {
        assert_eq!(
            extract_video_id("https://youtube.com/embed/xyz_-9?autoplay=1").as_deref(),
            Some("xyz_-9")
        );
        assert_eq!(extract_video_id("https://vimeo.com/123"), None);
    }
}
