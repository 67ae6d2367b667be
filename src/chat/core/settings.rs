//! User-facing settings and personality records persisted through the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default completion model.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default per-conversation message cap.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Colour theme.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark theme.
    #[default]
    Dark,
    /// Light theme.
    Light,
}

/// Settings blob stored under the settings key.
///
/// Field names follow the camelCase layout already present in users' stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Colour theme.
    pub theme: Theme,
    /// Persist conversations through the store.
    pub save_history: bool,
    /// Opt-in usage sharing flag (stored only).
    pub share_data: bool,
    /// BCP 47 language tag for speech features.
    pub language: String,
    /// Voice output selection (`none`, `male`, `female`).
    pub voice_output: String,
    /// Completion model name.
    pub model: String,
    /// Maximum retained messages per conversation.
    pub message_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            save_history: true,
            share_data: false,
            language: "en-US".to_string(),
            voice_output: "none".to_string(),
            model: DEFAULT_MODEL.to_string(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

impl ChatSettings {
    /// Message cap with a floor of one message.
    #[must_use]
    pub fn effective_message_limit(&self) -> usize {
        self.message_limit.max(1)
    }
}

/// Built-in assistant personalities.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityKind {
    /// Professional, concise answers.
    #[default]
    Assistant,
    /// Code-focused answers.
    Developer,
    /// Explanations with examples and analogies.
    Teacher,
    /// Imaginative answers.
    Creative,
}

impl PersonalityKind {
    /// All personalities in display order.
    pub const ALL: [Self; 4] = [
        Self::Assistant,
        Self::Developer,
        Self::Teacher,
        Self::Creative,
    ];

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Developer => "developer",
            Self::Teacher => "teacher",
            Self::Creative => "creative",
        }
    }

    /// Base system instruction for this personality.
    #[must_use]
    pub const fn instructions(self) -> &'static str {
        match self {
            Self::Assistant => {
                "You are Aziona, a professional AI assistant. Provide clear and concise answers to inquiries."
            }
            Self::Developer => {
                "You are Aziona, a technical AI assistant focused on code and development. Provide explanations with code examples when appropriate."
            }
            Self::Teacher => {
                "You are Aziona, an educational AI assistant. Explain concepts thoroughly with examples and analogies that are easy to understand."
            }
            Self::Creative => {
                "You are Aziona, a creative AI partner. Provide imaginative and inspiring responses to help with creative projects."
            }
        }
    }

    /// Opening sentence used by the offline fallback reply.
    #[must_use]
    pub const fn fallback_intro(self) -> &'static str {
        match self {
            Self::Assistant => {
                "As your professional assistant, I can provide a clear and concise answer to your inquiry."
            }
            Self::Developer => {
                "Looking at this from a technical perspective, let me explain with some code examples."
            }
            Self::Teacher => {
                "Let me explain this concept in a way that's easy to understand with some helpful examples."
            }
            Self::Creative => {
                "That sparks some interesting ideas! Here's a creative approach to what you're asking about."
            }
        }
    }
}

impl fmt::Display for PersonalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PersonalityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| value.to_string())
    }
}

/// Personality blob stored under the personality key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Personality {
    /// Selected personality.
    #[serde(rename = "type")]
    pub kind: PersonalityKind,
    /// Free-form instructions appended to the system prompt.
    pub custom_instructions: String,
}
