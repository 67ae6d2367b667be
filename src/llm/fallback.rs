//! Canned replies used when the completion endpoint is unavailable.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::chat::core::settings::PersonalityKind;

/// Generic reply bodies, one picked at random.
pub const GENERIC_RESPONSES: [&str; 5] = [
    "I understand what you're asking about. Let me provide some information on that topic.",
    "That's an interesting question. Here's what I know about it.",
    "I'd be happy to help with that. Here's my response.",
    "Based on my knowledge, I can offer the following insights.",
    "I've analyzed your question and here's what I can tell you.",
];

/// Suffix marking the reply as offline.
pub const FALLBACK_SUFFIX: &str =
    "(This is a fallback response because the API connection wasn't available.)";

/// Build a fallback reply for `personality` using the thread RNG.
#[must_use]
pub fn fallback_response(personality: PersonalityKind) -> String {
    fallback_response_with(personality, &mut rand::thread_rng())
}

/// Build a fallback reply choosing the generic body with `rng`.
pub fn fallback_response_with<R: Rng + ?Sized>(
    personality: PersonalityKind,
    rng: &mut R,
) -> String {
    let body = GENERIC_RESPONSES
        .choose(rng)
        .copied()
        .unwrap_or(GENERIC_RESPONSES[0]);
    format!("{} {body} {FALLBACK_SUFFIX}", personality.fallback_intro())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_fallback_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let reply = fallback_response_with(PersonalityKind::Developer, &mut rng);

        assert!(reply.starts_with(PersonalityKind::Developer.fallback_intro()));
        assert!(reply.ends_with(FALLBACK_SUFFIX));
        assert!(GENERIC_RESPONSES.iter().any(|body| reply.contains(body)));
    }

    #[test]
    fn test_every_personality_has_an_intro() {
        for kind in PersonalityKind::ALL {
            let reply = fallback_response(kind);
            assert!(reply.starts_with(kind.fallback_intro()));
        }
    }
}
