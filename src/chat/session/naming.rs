//! Heuristic conversation naming.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::chat::core::message::truncate_to_chars;

/// Number of leading words kept by the heuristic name.
pub const HEURISTIC_WORDS: usize = 5;

/// Maximum heuristic name length, ellipsis included.
pub const HEURISTIC_MAX_CHARS: usize = 30;

/// Maximum length of a generated title.
pub const GENERATED_MAX_CHARS: usize = 50;

/// Fallback name for a conversation renamed to blank.
pub const UNNAMED: &str = "Unnamed Conversation";

/// Name derived from the first user message: its first few words, length-capped.
#[must_use]
pub fn heuristic_name(message: &str) -> String {
    let name = message
        .split_whitespace()
        .take(HEURISTIC_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if name.chars().count() > HEURISTIC_MAX_CHARS {
        format!("{}...", truncate_to_chars(&name, HEURISTIC_MAX_CHARS - 3))
    } else {
        name
    }
}

/// Temporary name of a pending conversation, e.g. `New Chat (14:05)`.
#[must_use]
pub fn pending_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("New Chat ({})", now.format("%H:%M"))
}

/// Normalise a user-supplied name; blank names become [`UNNAMED`].
#[must_use]
pub fn normalize_user_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        UNNAMED.to_string()
    } else {
        name.to_string()
    }
}

/// Clean raw title output from the text-generation collaborator.
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn clean_generated_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = strip_prefix_ignore_case(line, "title:").unwrap_or(line);
    let title = line
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`'))
        .trim();
    if title.is_empty() {
        return None;
    }
    Some(truncate_to_chars(title, GENERATED_MAX_CHARS).trim_end().to_string())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
