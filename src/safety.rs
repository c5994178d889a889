//! Keyword-pattern screening of incoming chat messages.
//!
//! A message is rejected when it matches any toxic pattern, then any NSFW
//! pattern. Matching is case-insensitive on word boundaries.

use regex::Regex;
use std::sync::LazyLock;

const TOXIC_PATTERNS: &[&str] = &[
    r"\b(kill|murder|harm|hurt|attack|destroy|violence|weapon)\b",
    r"\b(hate|despise|loathe|abhor|racist|sexist)\b",
    r"\b(stupid|idiot|moron|fool|retard|dumb|shit)\b",
    r"\b(fuck|asshole|bastard|bitch|whore|piss)\b",
    r"\b(terror|bomb|shoot|kill myself|suicide)\b",
];

const NSFW_PATTERNS: &[&str] = &[
    r"\b(sex|sexual|porn|pornography|nude|naked|explicit|xxx)\b",
    r"\b(adult|nsfw|erotic|fetish|masturbat|orgasm)\b",
    r"\b(rape|molest|abuse|harass|pedophil)\b",
    r"\b(penis|vagina|breast|genital)\b",
];

pub const TOXIC_REASON: &str = "Content contains toxic or harmful language";
pub const NSFW_REASON: &str = "Content appears to be NSFW or inappropriate";

static TOXIC: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(TOXIC_PATTERNS));
static NSFW: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(NSFW_PATTERNS));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = p, error = %e, "invalid safety pattern");
                None
            }
        })
        .collect()
}

/// Why a message was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Rejection {
    pub reason: &'static str,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentSafetyGuard;

impl ContentSafetyGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, text: &str) -> Result<(), Rejection> {
        let lowered = text.to_lowercase();
        if TOXIC.iter().any(|re| re.is_match(&lowered)) {
            return Err(Rejection {
                reason: TOXIC_REASON,
            });
        }
        if NSFW.iter().any(|re| re.is_match(&lowered)) {
            return Err(Rejection {
                reason: NSFW_REASON,
            });
        }
        Ok(())
    }
}
