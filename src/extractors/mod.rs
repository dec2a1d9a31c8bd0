//! Candidate-name extraction strategies used when the LLM path is unavailable.

use std::collections::HashSet;

mod keyword;

pub use self::keyword::{KeywordExtractor, DEFAULT_LEXICON};

/// Pulls candidate medication names out of raw OCR text.
pub trait NameExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Never fails; an empty list means nothing was recognized.
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Trim, drop empties, and keep the first spelling of each name
/// (compared case-insensitively), preserving input order.
pub fn dedupe_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            unique.push(trimmed.to_string());
        }
    }

    unique
}
