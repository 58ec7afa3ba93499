//! Text normalization for the news corpus preparation pipeline.
//!
//! Raw article text goes in, an ordered sequence of normalized tokens comes
//! out. The same tokens feed both the embedding lookup and the
//! deduplication fingerprint, so the routine must be stable.
//!
//! ## What we do
//!
//! - Unicode normalization (NFKC) and locale-free lowercasing
//! - Markup tag, punctuation and digit stripping
//! - Stopword and short-token removal
//! - Porter stemming
//! - Content fingerprints for deduplication
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls, no OS/locale dependence. Same text and config,
//! same tokens, on any machine.

mod config;
mod error;
mod hash;
mod pipeline;
mod stem;
mod stopwords;

pub use crate::config::NormalizeConfig;
pub use crate::error::CanonicalError;
pub use crate::hash::{fingerprint_tokens, ContentFingerprint};
pub use crate::pipeline::normalize_tokens;
pub use crate::stem::stem;
pub use crate::stopwords::{is_stopword, STOPWORDS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_normalizes_article_text() {
        let cfg = NormalizeConfig::default();
        let tokens = normalize_tokens(
            "The <b>Senators</b> were running 12 investigations!",
            &cfg,
        )
        .expect("normalization succeeds");
        assert_eq!(tokens, vec!["senat", "run", "investig"]);
    }

    #[test]
    fn unicode_equivalence_nfkc() {
        let cfg = NormalizeConfig::default().with_stemming(false);
        let composed = normalize_tokens("Caf\u{00E9} society", &cfg).unwrap();
        let decomposed = normalize_tokens("Cafe\u{0301} society", &cfg).unwrap();
        assert_eq!(composed, decomposed);
        assert_eq!(fingerprint_tokens(&composed), fingerprint_tokens(&decomposed));
    }

    #[test]
    fn empty_after_filtering_is_not_an_error() {
        let cfg = NormalizeConfig::default();
        let tokens = normalize_tokens("  of the  and 42 ", &cfg).unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn short_tokens_are_dropped() {
        let cfg = NormalizeConfig::default()
            .with_stemming(false)
            .with_stopwords_removed(false);
        let tokens = normalize_tokens("ok go fbi agents", &cfg).unwrap();
        assert_eq!(tokens, vec!["fbi", "agents"]);
    }

    #[test]
    fn invalid_config_version_rejected() {
        let cfg = NormalizeConfig {
            version: 0,
            ..Default::default()
        };
        let res = normalize_tokens("content", &cfg);
        assert!(matches!(res, Err(CanonicalError::InvalidConfig(_))));
    }

    #[test]
    fn normalization_is_deterministic() {
        let cfg = NormalizeConfig::default();
        let text = "Breaking: officials confirmed the reports on Tuesday.";
        assert_eq!(
            normalize_tokens(text, &cfg).unwrap(),
            normalize_tokens(text, &cfg).unwrap()
        );
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = NormalizeConfig::default().with_min_token_len(2);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: NormalizeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
