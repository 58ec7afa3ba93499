use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or querying an embedding source.
///
/// An unknown token is never an error; resolvers report it as `None`.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The on-disk store does not exist. Fatal at initialization.
    #[error("embedding store not found at {0}")]
    StoreMissing(PathBuf),

    #[error("failed to read embedding source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed embedding source at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("embedding store failure: {0}")]
    Store(String),
}

impl EmbeddingError {
    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        EmbeddingError::Store(err.to_string())
    }
}
