//! Parallel text preprocessing with content deduplication.
//!
//! Articles from a [`CorpusReader`] are normalized on a [`WorkerPool`] and
//! streamed back in completion order. With duplicates disallowed, a record
//! whose content fingerprint was already emitted is dropped and its id is
//! recorded in [`PreprocessStats::skipped_ids`]; the first emission wins.

use std::collections::HashSet;
use std::convert::Infallible;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use canonical::{CanonicalError, ContentFingerprint, NormalizeConfig, fingerprint_tokens, normalize_tokens};
use ingest::{ArticleRecord, CorpusReader, IngestError, Label, RawText};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atomic::AtomicFile;
use crate::pool::{PoolConfig, PoolError, PoolStream, WorkerPool};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("invalid normalization config: {0}")]
    Canonical(#[from] CanonicalError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("corpus source failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode preprocessed record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One line of a preprocessed corpus file.
///
/// ```json
/// {"id": 7, "content": ["senat", "vote"], "label": "political"}
/// {"id": 8, "content": ["bill"], "title": ["senat"], "label": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessedRecord {
    pub id: i64,
    pub content: Vec<String>,
    /// Title tokens, present only for corpora prepared in separate mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Vec<String>>,
    pub label: Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreprocessOptions {
    pub duplicates_allowed: bool,
    /// Normalize title and content independently.
    pub separate: bool,
}

impl PreprocessOptions {
    pub fn new(duplicates_allowed: bool, separate: bool) -> Self {
        Self {
            duplicates_allowed,
            separate,
        }
    }
}

/// Running counters of a preprocessing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessStats {
    pub emitted: u64,
    /// Records whose normalization failed or panicked; skipped.
    pub failed: u64,
    /// Ids dropped as content duplicates.
    pub skipped_ids: Vec<i64>,
    /// Reserved. Never populated.
    pub missing_words: Vec<String>,
}

impl PreprocessStats {
    pub fn skipped(&self) -> usize {
        self.skipped_ids.len()
    }
}

/// Normalization failure of a single article.
#[derive(Debug)]
struct RecordFailure {
    id: i64,
    error: CanonicalError,
}

pub struct Preprocessor {
    normalize: Arc<NormalizeConfig>,
    pool: PoolConfig,
}

impl Preprocessor {
    pub fn new(normalize: NormalizeConfig, pool: PoolConfig) -> Result<Self, PreprocessError> {
        normalize.validate()?;
        pool.validate()?;
        Ok(Self {
            normalize: Arc::new(normalize),
            pool,
        })
    }

    /// Start normalizing `reader` on the worker pool.
    pub fn run<R>(&self, reader: CorpusReader<R>, options: PreprocessOptions) -> Result<PreprocessStream, PoolError>
    where
        R: Read + Send + 'static,
    {
        let normalize = Arc::clone(&self.normalize);
        let separate = options.separate;

        let inner = WorkerPool::run(
            reader,
            &self.pool,
            move |_worker| Ok::<_, Infallible>(Arc::clone(&normalize)),
            move |cfg: &mut Arc<NormalizeConfig>, article: Result<ArticleRecord, IngestError>| {
                article.map(|article| normalize_article(cfg, article, separate))
            },
        )?;

        tracing::info!(
            workers = self.pool.workers,
            duplicates_allowed = options.duplicates_allowed,
            separate,
            "preprocessing started"
        );
        Ok(PreprocessStream::new(inner, options.duplicates_allowed))
    }
}

fn normalize_article(
    cfg: &NormalizeConfig,
    article: ArticleRecord,
    separate: bool,
) -> Result<PreprocessedRecord, RecordFailure> {
    let id = article.id;
    let fail = |error: CanonicalError| RecordFailure { id, error };

    let (title, content) = match (article.text, separate) {
        (RawText::Separate { title, content }, true) => {
            let title = normalize_tokens(&title, cfg).map_err(fail)?;
            (Some(title), normalize_tokens(&content, cfg).map_err(fail)?)
        }
        (RawText::Separate { title, content }, false) => {
            let joined = format!("{title} {content}");
            (None, normalize_tokens(&joined, cfg).map_err(fail)?)
        }
        (RawText::Joined(text), _) => (None, normalize_tokens(&text, cfg).map_err(fail)?),
    };

    Ok(PreprocessedRecord {
        id,
        content,
        title,
        label: article.label,
    })
}

type WorkerOutput = Result<Result<PreprocessedRecord, RecordFailure>, IngestError>;

/// Normalized records in pool completion order.
///
/// A failure of the corpus source is yielded as an error and ends the
/// stream; whatever was emitted before it is not a complete corpus.
pub struct PreprocessStream {
    inner: PoolStream<WorkerOutput>,
    duplicates_allowed: bool,
    seen: HashSet<ContentFingerprint>,
    stats: PreprocessStats,
    finished: bool,
}

impl PreprocessStream {
    fn new(inner: PoolStream<WorkerOutput>, duplicates_allowed: bool) -> Self {
        Self {
            inner,
            duplicates_allowed,
            seen: HashSet::new(),
            stats: PreprocessStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> &PreprocessStats {
        &self.stats
    }

    pub fn into_stats(self) -> PreprocessStats {
        self.stats
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            tracing::info!(
                emitted = self.stats.emitted,
                failed = self.stats.failed,
                skipped = self.stats.skipped(),
                "preprocessing finished, skipped {} duplicates",
                self.stats.skipped()
            );
        }
    }
}

impl Iterator for PreprocessStream {
    type Item = Result<PreprocessedRecord, PreprocessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let record = match self.inner.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(PoolError::WorkerPanicked { worker, message })) => {
                    self.stats.failed += 1;
                    tracing::warn!(worker, panic = %message, "skipping article whose normalization panicked");
                    continue;
                }
                Some(Err(err)) => return Some(Err(err.into())),
                Some(Ok(Err(err))) => {
                    self.finished = true;
                    tracing::error!(error = %err, emitted = self.stats.emitted, "corpus source failed, preprocessing aborted");
                    return Some(Err(err.into()));
                }
                Some(Ok(Ok(Err(failure)))) => {
                    self.stats.failed += 1;
                    tracing::warn!(id = failure.id, error = %failure.error, "skipping article that failed normalization");
                    continue;
                }
                Some(Ok(Ok(Ok(record)))) => record,
            };

            if !self.duplicates_allowed {
                let fingerprint = fingerprint_tokens(&record.content);
                if !self.seen.insert(fingerprint) {
                    tracing::debug!(id = record.id, fingerprint = %fingerprint.to_hex(), "duplicate content skipped");
                    self.stats.skipped_ids.push(record.id);
                    continue;
                }
            }

            self.stats.emitted += 1;
            return Some(Ok(record));
        }
    }
}

/// Drain `stream` into a JSONL file at `path`. The file only appears once
/// every record was written.
pub fn write_preprocessed(
    mut stream: PreprocessStream,
    path: impl AsRef<Path>,
) -> Result<PreprocessStats, PreprocessError> {
    let path = path.as_ref();
    let io_err = |source| PreprocessError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut out = AtomicFile::create(path).map_err(io_err)?;
    for record in stream.by_ref() {
        let record = record?;
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n").map_err(io_err)?;
    }
    out.commit().map_err(io_err)?;

    tracing::info!(path = %path.display(), emitted = stream.stats().emitted, "wrote preprocessed corpus");
    Ok(stream.into_stats())
}
