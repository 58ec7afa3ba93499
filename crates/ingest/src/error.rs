//! Error types produced by the ingest crate.
//!
//! Only source-level failures surface as errors. Per-row problems are
//! logged and the row skipped; they never end the stream. A failure of the
//! underlying reader does end it, as the final item of the stream.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The corpus source could not be opened.
    #[error("failed to open corpus source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header row could not be read.
    #[error("failed to read corpus header: {0}")]
    Header(#[from] csv::Error),

    /// The source failed partway through the stream. Rows already yielded
    /// are not a complete corpus.
    #[error("corpus source read failed: {0}")]
    Read(#[source] csv::Error),

    /// A required column is absent from the header row.
    #[error("corpus header is missing required column `{0}`")]
    MissingColumn(&'static str),

    /// A chunk size of zero would never make progress.
    #[error("chunk_size must be > 0")]
    InvalidChunkSize,
}
