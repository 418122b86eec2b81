//! Keyword and pattern matching over normalized text.

use asis_core::collaborator::ContentClassifier;
use regex::Regex;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::{Classification, ClassifierConfig, ClassifierError};

/// Lowercase and strip diacritics: "Samovražda" becomes "samovrazda".
pub fn normalize(text: &str) -> String {
    text.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)).collect()
}

pub struct KeywordClassifier {
    keywords: Vec<String>,
    patterns: Vec<(String, Regex)>,
}

impl KeywordClassifier {
    /// Compile the config. Keywords are normalized the same way as input.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let keywords = config
            .keywords
            .iter()
            .map(|k| normalize(k.trim()))
            .filter(|k| !k.is_empty())
            .collect();
        let patterns = config
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map(|re| (p.clone(), re))
                    .map_err(|source| ClassifierError::InvalidPattern { pattern: p.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keywords, patterns })
    }

    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize(text);
        let mut matched: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| normalized.contains(k.as_str()))
            .cloned()
            .collect();
        matched.extend(
            self.patterns
                .iter()
                .filter(|(_, re)| re.is_match(&normalized))
                .map(|(p, _)| p.clone()),
        );
        if !matched.is_empty() {
            debug!(signals = matched.len(), "crisis signals matched");
        }
        Classification { crisis: !matched.is_empty(), matched }
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl ContentClassifier for KeywordClassifier {
    fn assess(&self, text: &str) -> Vec<String> {
        self.classify(text).matched
    }
}
