//! Greeting detection.
//!
//! Small talk such as "hello" or "how are you" gets a canned reply instead of
//! an embedding + retrieval round trip. Patterns are anchored at the start of
//! the query only, so "thanks, and hello" is not a greeting while
//! "hello, what is AWP?" is.

use rand::Rng;
use regex::RegexSet;

const GREETING_PATTERNS: &[&str] = &[
    r"^(hi|hello|hey|hiya|howdy|yo|greetings)\b",
    r"^good\s+(morning|afternoon|evening|day)\b",
    r"^how\s+are\s+(you|u|ya)\b",
    r"^how('?s|\s+is)\s+it\s+going\b",
    r"^what'?s\s+up\b",
    r"^(hola|bonjour|bonsoir|salut|hallo|ciao|namaste|konnichiwa|ni\s*hao|ol[aá])\b",
    r"^(buenos\s+d[ií]as|buenas\s+(tardes|noches)|guten\s+(morgen|tag|abend))\b",
    r"^¿?(c[oó]mo\s+est[aá]s|qu[eé]\s+tal)\b",
    r"^(ça|ca)\s+va\b",
];

/// Replies used when a query is classified as a greeting.
pub const GREETING_REPLIES: &[&str] = &[
    "Hello! How can I help you with the documentation today?",
    "Hi there! What would you like to know?",
    "Hey! Ask me anything about the docs and I'll look it up.",
    "Hi! I'm doing well, thanks for asking. What can I help you with?",
    "Greetings! What question can I answer for you today?",
];

pub struct GreetingClassifier {
    patterns: RegexSet,
}

impl GreetingClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: RegexSet::new(GREETING_PATTERNS)?,
        })
    }

    /// True when the query opens with a known greeting. Trims and lower-cases first.
    pub fn is_greeting(&self, query: &str) -> bool {
        let normalized = query.trim().to_lowercase();
        self.patterns.is_match(&normalized)
    }
}

/// Pick one of [`GREETING_REPLIES`] uniformly at random.
pub fn pick_reply<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    GREETING_REPLIES[rng.random_range(0..GREETING_REPLIES.len())]
}
