//! Corpus reader for the news preparation pipeline.
//!
//! Streams `(identifier, raw text, label)` triples out of a chunked CSV
//! source with an optional label filter. This is the first stage of the
//! pipeline; everything downstream consumes [`ArticleRecord`]s.
//!
//! ```rust
//! use ingest::{CorpusReader, Label, ReaderConfig, ReaderMode, RawText};
//!
//! let csv = "id,title,content,type\n\
//!            1,Moon,landing was staged,conspiracy\n\
//!            2,Budget,passes senate,reliable\n\
//!            3,Lol,cats,satire\n";
//!
//! let reader = CorpusReader::from_reader(csv.as_bytes(), ReaderConfig::new(ReaderMode::Binary)).unwrap();
//! let records: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
//!
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1].label, Label::Numeric(1));
//! assert_eq!(records[0].text, RawText::Joined("Moon landing was staged".into()));
//! ```

mod config;
mod error;
mod reader;
mod types;

pub use crate::config::{ReaderConfig, ReaderMode};
pub use crate::error::IngestError;
pub use crate::reader::{CorpusReader, ReaderStats};
pub use crate::types::{ArticleRecord, Label, RawText, BINARY_LABELS, RELIABLE_LABEL};
