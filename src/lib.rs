//! Workspace umbrella crate for the news corpus preparation pipeline.
//!
//! Turns a labelled CSV news corpus into shuffled train/test/validation
//! JSONL splits and streams those splits back as fixed-shape tensor batches.
//!
//! ```text
//! ingest ─► preprocess (canonical, pool) ─► shuffle ─► split ─► batch (embedding)
//! ```
//!
//! The member crates are re-exported here so callers only depend on
//! `newsprep`.

mod atomic;
pub mod batch;
pub mod config;
pub mod pipeline;
pub mod pool;
pub mod preprocess;
pub mod shuffle;
pub mod split;

pub use canonical::{
    CanonicalError, ContentFingerprint, NormalizeConfig, fingerprint_tokens, normalize_tokens,
};
pub use embedding::{
    BackedStore, EMBEDDING_DIM, EmbeddingError, EmbeddingResolver, ResidentTable, StoreReader,
    VocabularyIndex,
};
pub use ingest::{
    ArticleRecord, CorpusReader, IngestError, Label, RawText, ReaderConfig, ReaderMode,
    ReaderStats,
};

pub use batch::{
    BackedBatches, Batch, BatchError, BatchInputs, EmbeddedBatches, IndexedBatches,
    MultiLabelBatches, NEWS_LABELS, SeparateBatches,
};
pub use config::{BatchSection, ConfigLoadError, DATA_DIR_ENV, DatasetFlavor, DatasetPaths, PrepConfig};
pub use pipeline::{PrepareReport, build_embedding_store, prepare};
pub use pool::{PoolConfig, PoolError, PoolStream, WorkerPool};
pub use preprocess::{
    PreprocessError, PreprocessOptions, PreprocessStats, PreprocessStream, PreprocessedRecord,
    Preprocessor, write_preprocessed,
};
pub use shuffle::shuffle_lines;
pub use split::{SplitError, SplitOutcome, SplitPaths, SplitSizes, count_lines, split_corpus};

use std::error::Error;
use std::fmt;

/// Errors that can occur while preparing a dataset.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigLoadError),
    Canonical(CanonicalError),
    Ingest(IngestError),
    Embedding(EmbeddingError),
    Pool(PoolError),
    Preprocess(PreprocessError),
    Split(SplitError),
    Batch(BatchError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(err) => write!(f, "configuration failure: {err}"),
            PipelineError::Canonical(err) => write!(f, "normalization failure: {err}"),
            PipelineError::Ingest(err) => write!(f, "corpus read failure: {err}"),
            PipelineError::Embedding(err) => write!(f, "embedding failure: {err}"),
            PipelineError::Pool(err) => write!(f, "worker pool failure: {err}"),
            PipelineError::Preprocess(err) => write!(f, "preprocessing failure: {err}"),
            PipelineError::Split(err) => write!(f, "shuffle/split failure: {err}"),
            PipelineError::Batch(err) => write!(f, "batch generation failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Config(err) => Some(err),
            PipelineError::Canonical(err) => Some(err),
            PipelineError::Ingest(err) => Some(err),
            PipelineError::Embedding(err) => Some(err),
            PipelineError::Pool(err) => Some(err),
            PipelineError::Preprocess(err) => Some(err),
            PipelineError::Split(err) => Some(err),
            PipelineError::Batch(err) => Some(err),
        }
    }
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::Config(value)
    }
}

impl From<CanonicalError> for PipelineError {
    fn from(value: CanonicalError) -> Self {
        PipelineError::Canonical(value)
    }
}

impl From<IngestError> for PipelineError {
    fn from(value: IngestError) -> Self {
        PipelineError::Ingest(value)
    }
}

impl From<EmbeddingError> for PipelineError {
    fn from(value: EmbeddingError) -> Self {
        PipelineError::Embedding(value)
    }
}

impl From<PoolError> for PipelineError {
    fn from(value: PoolError) -> Self {
        PipelineError::Pool(value)
    }
}

impl From<PreprocessError> for PipelineError {
    fn from(value: PreprocessError) -> Self {
        PipelineError::Preprocess(value)
    }
}

impl From<SplitError> for PipelineError {
    fn from(value: SplitError) -> Self {
        PipelineError::Split(value)
    }
}

impl From<BatchError> for PipelineError {
    fn from(value: BatchError) -> Self {
        PipelineError::Batch(value)
    }
}
