use std::borrow::Cow;

use unicode_categories::UnicodeCategories;
use unicode_normalization::UnicodeNormalization;

use crate::config::NormalizeConfig;
use crate::error::CanonicalError;
use crate::stem::stem;
use crate::stopwords::is_stopword;

/// Main entry point. Normalizes raw article text into an ordered token
/// sequence according to `cfg`.
///
/// Text that normalizes to nothing yields an empty vector; empty articles
/// are legal records and are left for the caller to keep or drop.
pub fn normalize_tokens(input: &str, cfg: &NormalizeConfig) -> Result<Vec<String>, CanonicalError> {
    cfg.validate()?;

    // Unicode normalization runs first, as it can change character boundaries.
    let normalized: Cow<str> = if cfg.normalize_unicode {
        Cow::Owned(input.nfkc().collect::<String>())
    } else {
        Cow::Borrowed(input)
    };

    let untagged: Cow<str> = if cfg.strip_tags {
        strip_tags(normalized.as_ref())
    } else {
        Cow::Borrowed(normalized.as_ref())
    };

    let mut tokens: Vec<String> = Vec::with_capacity((untagged.len() / 6).saturating_add(1));
    let mut current = String::new();

    for ch in untagged.chars() {
        // Lowercasing can expand a single character into several.
        if cfg.lowercase {
            for lower in ch.to_lowercase() {
                dispatch_char(lower, cfg, &mut current, &mut tokens);
            }
        } else {
            dispatch_char(ch, cfg, &mut current, &mut tokens);
        }
    }
    finalize_token(&mut current, &mut tokens);

    Ok(tokens
        .into_iter()
        .filter(|token| !(cfg.remove_stopwords && is_stopword(token)))
        .filter(|token| token.chars().count() >= cfg.min_token_len)
        .map(|token| if cfg.stem { stem(&token) } else { token })
        .collect())
}

/// Decides whether a character extends the current token, ends it, or is dropped.
fn dispatch_char(ch: char, cfg: &NormalizeConfig, current: &mut String, tokens: &mut Vec<String>) {
    let is_delim =
        ch.is_whitespace() || (cfg.strip_punctuation && (ch.is_punctuation() || ch.is_symbol()));
    if is_delim {
        finalize_token(current, tokens);
    } else if cfg.strip_numeric && (ch.is_ascii_digit() || ch.is_number_decimal_digit()) {
        // Digits vanish without splitting the token they sit in.
    } else {
        current.push(ch);
    }
}

fn finalize_token(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Replace every `<...>` span (at least one character between the brackets)
/// with a single space. An unmatched `<` is kept.
fn strip_tags(text: &str) -> Cow<'_, str> {
    if !text.contains('<') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => {
                out.push_str(&rest[..open]);
                out.push(' ');
                rest = &after[close + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
