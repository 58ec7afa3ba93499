//! Content fingerprints used as deduplication keys.
//!
//! A fingerprint is a 128-bit XXH3 digest over the normalized token stream:
//!
//! ```text
//! XXH3-128(token_0 || 0x1F || token_1 || 0x1F || ... || token_n || 0x1F)
//! ```
//!
//! The unit-separator byte keeps `["ab", "c"]` and `["a", "bc"]` distinct.
//! Fingerprints are deterministic across runs and machines, which the
//! deduplication set relies on when a corpus is re-prepared.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

const TOKEN_SEPARATOR: u8 = 0x1F;

/// Fingerprint of a normalized content token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentFingerprint(pub u128);

impl ContentFingerprint {
    /// Lowercase hex rendering, 32 characters.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

/// Compute the fingerprint of an ordered token sequence.
///
/// ```rust
/// use canonical::fingerprint_tokens;
///
/// let a = fingerprint_tokens(&["senat", "vote"]);
/// let b = fingerprint_tokens(&["senat".to_string(), "vote".to_string()]);
/// assert_eq!(a, b);
/// assert_ne!(a, fingerprint_tokens(&["vote", "senat"]));
/// ```
pub fn fingerprint_tokens<S: AsRef<str>>(tokens: &[S]) -> ContentFingerprint {
    let mut hasher = Xxh3::new();
    for token in tokens {
        hasher.update(token.as_ref().as_bytes());
        hasher.update(&[TOKEN_SEPARATOR]);
    }
    ContentFingerprint(hasher.digest128())
}
