//! Crisis and NSFW term interception.
//!
//! A deliberately crude, non-semantic guard: lowercase the text and scan
//! for banned substrings. The contract stays "pure function text -> bool"
//! so a real classifier can replace the term scan without changing any
//! caller.

/// Terms that trigger the safety interception, matched case-insensitively
/// as substrings anywhere in the message.
pub const BANNED_TERMS: &[&str] = &[
    "suicide",
    "kill myself",
    "self harm",
    "harm others",
    "nsfw",
    "sex",
    "nude",
];

/// Stateless substring classifier over a fixed term list.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    terms: Vec<String>,
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyFilter {
    pub fn new() -> Self {
        Self::with_terms(BANNED_TERMS.iter().map(|t| (*t).to_string()))
    }

    /// Build a filter over a custom term list. Terms are lowercased; empty
    /// terms are dropped so they cannot match everything.
    pub fn with_terms(terms: impl IntoIterator<Item = String>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// True when the text contains any banned term. Short-circuits on the
    /// first match.
    pub fn classify(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.terms.iter().any(|term| lower.contains(term.as_str()))
    }
}
