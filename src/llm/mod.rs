//! Completion collaborator: contract, HTTP client, fallback replies, titles and suggestions.

pub mod completion;
pub mod fallback;
pub mod suggestions;
pub mod title;

pub use completion::{
    CompletionClient, CompletionError, CompletionMessage, CompletionRequest, CompletionResult,
    HttpCompletionClient, parse_completion,
};
pub use fallback::fallback_response;
pub use suggestions::{parse_suggestions, suggest};
pub use title::{TitleSeed, generate_title};
