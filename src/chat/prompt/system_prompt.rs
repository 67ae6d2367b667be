//! System prompt builder.

use crate::chat::core::settings::Personality;

/// Markdown guidance appended after the personality instruction.
pub const FORMATTING_GUIDANCE: &str = "Please format your responses using Markdown for better readability:\n\
- Use **bold** and *italic* for emphasis\n\
- Use `code` for inline code and ```language\ncode\n``` for code blocks\n\
- Use proper headings with # and ## for sections\n\
- Use bullet points and numbered lists where appropriate\n\
- Create tables using Markdown table syntax when displaying tabular data\n\
- Use > for blockquotes\n\
- Include language name in code blocks for proper syntax highlighting";

/// Build the system prompt for `personality`.
///
/// Custom instructions are appended once, after the formatting guidance.
#[must_use]
pub fn build_system_prompt(personality: &Personality) -> String {
    let instructions = personality.kind.instructions();
    let custom = personality.custom_instructions.trim();

    let mut out =
        String::with_capacity(instructions.len() + FORMATTING_GUIDANCE.len() + custom.len() + 4);
    out.push_str(instructions);
    out.push_str("\n\n");
    out.push_str(FORMATTING_GUIDANCE);
    if !custom.is_empty() {
        out.push_str("\n\n");
        out.push_str(custom);
    }
    out
}
