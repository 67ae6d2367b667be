//! Follow-up suggestions for the active conversation.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::chat::core::message::{Role, preview};
use crate::chat::session::context::ContextEntry;
use crate::llm::completion::{CompletionClient, CompletionMessage, CompletionRequest};

/// Suggestions shown before any exchange.
pub const DEFAULT_SUGGESTIONS: [&str; 4] = [
    "Explain quantum computing",
    "Summarize this article",
    "Write a poem about nature",
    "Help debug my code",
];

/// Suggestions used when generation fails.
pub const GENERIC_SUGGESTIONS: [&str; 4] = [
    "Tell me more about this",
    "How does this work?",
    "Can you give examples?",
    "What are alternatives?",
];

/// How many suggestions are returned.
pub const SUGGESTION_COUNT: usize = 4;

/// Number of trailing context entries included in the prompt.
pub const CONTEXT_WINDOW: usize = 4;

const ENTRY_PREVIEW_CHARS: usize = 100;
const MAX_LINE_CHARS: usize = 50;

const SUGGESTION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates follow-up questions.";

struct SuggestionParser {
    array: Regex,
    list_prefix: Regex,
}

impl SuggestionParser {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            array: Regex::new(r"(?s)\[.*\]")?,
            list_prefix: Regex::new(r#"^[0-9\-."*]*\s*"#)?,
        })
    }

    fn parse(&self, content: &str) -> Vec<String> {
        let json = self
            .array
            .find(content)
            .map_or(content, |m| m.as_str());
        if let Ok(items) = serde_json::from_str::<Vec<String>>(json) {
            return items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(SUGGESTION_COUNT)
                .collect();
        }

        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && line.chars().count() < MAX_LINE_CHARS)
            .map(|line| {
                self.list_prefix
                    .replace(line, "")
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string()
            })
            .filter(|s| !s.is_empty())
            .take(SUGGESTION_COUNT)
            .collect()
    }
}

fn parser() -> Option<&'static SuggestionParser> {
    static PARSER: OnceLock<Option<SuggestionParser>> = OnceLock::new();
    PARSER
        .get_or_init(|| {
            SuggestionParser::new()
                .map_err(|e| warn!("Suggestion parser unavailable: {e}"))
                .ok()
        })
        .as_ref()
}

fn owned(items: [&str; SUGGESTION_COUNT]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Build the suggestion request from the tail of the session context.
///
/// Returns `None` when the context holds no dialogue.
#[must_use]
pub fn suggestion_request(model: &str, entries: &[ContextEntry]) -> Option<CompletionRequest> {
    let dialogue: Vec<_> = entries.iter().filter(|e| e.role.is_dialogue()).collect();
    if dialogue.is_empty() {
        return None;
    }

    let start = dialogue.len().saturating_sub(CONTEXT_WINDOW);
    let context: String = dialogue[start..]
        .iter()
        .map(|e| format!("{}: {}\n", e.role, preview(&e.content, ENTRY_PREVIEW_CHARS)))
        .collect();

    let prompt = format!(
        "Based on this conversation:\n{context}\n\n\
Generate 4 short follow-up questions or topics the user might be interested in asking next. \
Each should be under 40 characters. \
Return only the questions as a JSON array [\"question1\", \"question2\", \"question3\", \"question4\"] with no explanation."
    );

    Some(
        CompletionRequest::new(
            model,
            vec![
                CompletionMessage::new(Role::System, SUGGESTION_SYSTEM_PROMPT),
                CompletionMessage::new(Role::User, prompt),
            ],
        )
        .with_temperature(0.7)
        .with_max_tokens(150),
    )
}

/// Parse collaborator output into suggestions, falling back to the generic set.
#[must_use]
pub fn parse_suggestions(content: &str) -> Vec<String> {
    let parsed = parser().map(|p| p.parse(content)).unwrap_or_default();
    if parsed.is_empty() {
        debug!("Could not parse suggestions, using generic ones");
        owned(GENERIC_SUGGESTIONS)
    } else {
        parsed
    }
}

/// Follow-up suggestions for `entries`. Never fails.
pub async fn suggest(
    client: &dyn CompletionClient,
    model: &str,
    entries: &[ContextEntry],
) -> Vec<String> {
    let Some(request) = suggestion_request(model, entries) else {
        return owned(DEFAULT_SUGGESTIONS);
    };

    match client.complete(&request).await {
        Ok(content) => parse_suggestions(&content),
        Err(err) => {
            warn!("Suggestion request failed: {err}");
            owned(GENERIC_SUGGESTIONS)
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::llm::completion::{CompletionError, CompletionResult};

    fn entry(role: Role, content: &str) -> ContextEntry {
        ContextEntry {
            role,
            content: content.to_string(),
            message_id: None,
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionClient for Failing {
        async fn complete(&self, _request: &CompletionRequest) -> CompletionResult<String> {
            Err(CompletionError::Transport("offline".to_string()))
        }
    }

    #[test]
    fn test_parse_embedded_json_array() {
        let content = "Sure! Here you go:\n\
            [\"What is Rust?\", \"Why async?\", \"Show traits\", \"Compare Go\", \"Extra\"]";
        assert_eq!(
            parse_suggestions(content),
            ["What is Rust?", "Why async?", "Show traits", "Compare Go"]
        );
    }

    #[test]
    fn test_parse_numbered_lines() {
        let content = "1. \"What is ownership?\"\n\
            2. How do lifetimes work?\n\n\
            - Borrow checker tips\n\
            This line is definitely far too long to be treated as a suggestion";
        assert_eq!(
            parse_suggestions(content),
            [
                "What is ownership?",
                "How do lifetimes work?",
                "Borrow checker tips"
            ]
        );
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        let long = "x".repeat(80);
        assert_eq!(parse_suggestions(&long), owned(GENERIC_SUGGESTIONS));
        assert_eq!(parse_suggestions("[]"), owned(GENERIC_SUGGESTIONS));
    }

    #[test]
    fn test_request_uses_last_four_entries() {
        let entries: Vec<_> = (0..6)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                entry(role, &format!("m{i}"))
            })
            .collect();
        let request = suggestion_request("m", &entries).unwrap();
        let prompt = &request.messages[1].content;
        assert!(!prompt.contains("m1"));
        assert!(prompt.contains("user: m2"));
        assert!(prompt.contains("assistant: m5"));
        assert_eq!(request.max_tokens, 150);
    }

    #[tokio::test]
    async fn test_empty_context_gives_defaults() {
        let suggestions = suggest(&Failing, "m", &[]).await;
        assert_eq!(suggestions, owned(DEFAULT_SUGGESTIONS));
    }

    #[tokio::test]
    async fn test_failure_gives_generic() {
        let entries = [entry(Role::User, "hi"), entry(Role::Assistant, "hello")];
        let suggestions = suggest(&Failing, "m", &entries).await;
        assert_eq!(suggestions, owned(GENERIC_SUGGESTIONS));
    }
}
