//! Prompt construction.

pub mod system_prompt;

pub use system_prompt::{FORMATTING_GUIDANCE, build_system_prompt};
