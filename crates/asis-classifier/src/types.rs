use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of classifying one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub crisis: bool,
    /// Keywords and patterns that fired, in config order.
    pub matched: Vec<String>,
}

/// Keyword and pattern lists. Both are matched against lowercased text with
/// diacritics removed, so entries should be written that way too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub keywords: Vec<String>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
