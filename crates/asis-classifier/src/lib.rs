//! Keyword/pattern crisis classifier for English, Slovak and Czech messages.

pub mod config;
pub mod rules;
pub mod types;

pub use rules::{normalize, KeywordClassifier};
pub use types::{Classification, ClassifierConfig, ClassifierError};
