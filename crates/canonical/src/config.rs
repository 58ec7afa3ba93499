//! Configuration types for the normalization routine.
//!
//! [`NormalizeConfig`] controls which filters of the normalization chain run.
//! The defaults reproduce the filter chain the downstream classifier was
//! trained against, so changing them changes the vocabulary of every
//! persisted corpus.
//!
//! # Versioning
//!
//! Any change to normalization behavior (even bug fixes) must be accompanied
//! by a version bump. Corpora produced under different versions are not
//! interchangeable and their fingerprints must not be mixed.
//!
//! # Examples
//!
//! ```rust
//! use canonical::NormalizeConfig;
//!
//! let config = NormalizeConfig::default();
//! assert_eq!(config.version, 1);
//! assert!(config.stem);
//! assert_eq!(config.min_token_len, 3);
//!
//! // Keep surface forms, only lowercase and split.
//! let raw = NormalizeConfig {
//!     remove_stopwords: false,
//!     stem: false,
//!     min_token_len: 1,
//!     ..Default::default()
//! };
//! assert!(raw.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CanonicalError;

/// Configuration for the normalization routine.
///
/// Filters run in a fixed order: unicode normalization, lowercasing, tag
/// stripping, punctuation splitting, numeric stripping, stopword removal,
/// short-token removal and finally stemming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Version of the normalization behavior.
    ///
    /// Must be >= 1; version 0 is reserved and rejected by [`validate`](Self::validate).
    pub version: u32,

    /// Apply Unicode NFKC normalization before any other filter.
    ///
    /// Merges composed and decomposed forms (`"é"` vs `"e\u{301}"`) so the
    /// same word always maps to the same token.
    pub normalize_unicode: bool,

    /// Apply locale-free Unicode lowercasing.
    pub lowercase: bool,

    /// Treat `<...>` markup spans as delimiters.
    ///
    /// Scraped article bodies frequently carry leftover HTML. An unclosed
    /// `<` is kept as an ordinary character.
    pub strip_tags: bool,

    /// Treat Unicode punctuation and symbol characters as delimiters.
    ///
    /// ```text
    /// "it's 100% fun." → ["it", "s", "100", "fun"]   (strip_numeric off)
    /// ```
    pub strip_punctuation: bool,

    /// Remove decimal digits without splitting the surrounding token.
    ///
    /// ```text
    /// "covid19" → "covid"
    /// "2018"    → (dropped)
    /// ```
    pub strip_numeric: bool,

    /// Drop tokens found in the English stopword list.
    pub remove_stopwords: bool,

    /// Drop tokens with fewer than this many characters (counted in chars,
    /// not bytes). Applied after stopword removal and before stemming.
    pub min_token_len: usize,

    /// Apply the Porter stemmer to every surviving token.
    pub stem: bool,
}

impl NormalizeConfig {
    /// Create a configuration with the default filter chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable stemming.
    pub fn with_stemming(mut self, stem: bool) -> Self {
        self.stem = stem;
        self
    }

    /// Enable or disable stopword removal.
    pub fn with_stopwords_removed(mut self, remove: bool) -> Self {
        self.remove_stopwords = remove;
        self
    }

    /// Set the minimum surviving token length.
    pub fn with_min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.version == 0 {
            return Err(CanonicalError::InvalidConfig(
                "config version must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            normalize_unicode: true,
            lowercase: true,
            strip_tags: true,
            strip_punctuation: true,
            strip_numeric: true,
            remove_stopwords: true,
            min_token_len: 3,
            stem: true,
        }
    }
}
