//! Configuration for the corpus reader.

use serde::{Deserialize, Serialize};

/// Label handling mode of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderMode {
    /// Keep only the four binary labels and reduce them to 0/1.
    Binary,
    /// Pass the original label string through unfiltered.
    #[default]
    Multiclass,
}

/// Runtime configuration for [`CorpusReader`](crate::CorpusReader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub mode: ReaderMode,
    /// Yield title and content as a pair instead of one joined string.
    pub separate: bool,
    /// Rows pulled from the source per chunk.
    pub chunk_size: usize,
}

impl ReaderConfig {
    pub fn new(mode: ReaderMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_separate(mut self, separate: bool) -> Self {
        self.separate = separate;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            mode: ReaderMode::default(),
            separate: false,
            chunk_size: 10_000,
        }
    }
}
