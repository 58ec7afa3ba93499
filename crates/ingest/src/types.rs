//! Core data model types for the ingest crate.
//!
//! ```text
//! CSV row (id, title, content, type)
//!
//!         ↓ CorpusReader
//!
//! ArticleRecord
//! ├── id: i64
//! ├── text: RawText
//! │   ├── Joined(String)                    "{title} {content}"
//! │   └── Separate { title, content }
//! └── label: Label
//!     ├── Numeric(i64)                      binary mode: reliable = 1, else 0
//!     └── Class(String)                     multiclass mode: original `type`
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Labels kept in binary mode. Everything else is filtered out before
/// labels are reduced to 0/1.
pub const BINARY_LABELS: [&str; 4] = ["fake", "conspiracy", "unreliable", "reliable"];

/// The only label encoded as `1` by every binary policy.
pub const RELIABLE_LABEL: &str = "reliable";

/// Article label as carried by the corpus and the persisted line format.
///
/// Serializes as a bare JSON integer or string:
///
/// ```rust
/// use ingest::Label;
///
/// assert_eq!(serde_json::to_string(&Label::Numeric(1)).unwrap(), "1");
/// assert_eq!(serde_json::to_string(&Label::Class("satire".into())).unwrap(), "\"satire\"");
/// let back: Label = serde_json::from_str("\"fake\"").unwrap();
/// assert_eq!(back.as_class(), Some("fake"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Numeric(i64),
    Class(String),
}

impl Label {
    /// Reduce an original `type` value to the binary reliable/unreliable label.
    pub fn binary(kind: &str) -> Self {
        Label::Numeric(i64::from(kind == RELIABLE_LABEL))
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Label::Numeric(value) => Some(*value),
            Label::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&str> {
        match self {
            Label::Class(name) => Some(name.as_str()),
            Label::Numeric(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Numeric(value) => write!(f, "{value}"),
            Label::Class(name) => f.write_str(name),
        }
    }
}

/// Raw article text, either concatenated or kept as a title/content pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawText {
    Joined(String),
    Separate { title: String, content: String },
}

impl RawText {
    /// Build the text for a row. A missing title is the empty string.
    pub fn from_fields(title: &str, content: &str, separate: bool) -> Self {
        if separate {
            RawText::Separate {
                title: title.to_string(),
                content: content.to_string(),
            }
        } else {
            RawText::Joined(format!("{title} {content}"))
        }
    }
}

/// One article as streamed by [`CorpusReader`](crate::CorpusReader).
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub text: RawText,
    pub label: Label,
}
