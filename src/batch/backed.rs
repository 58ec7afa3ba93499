use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use embedding::{BackedStore, EmbeddingResolver, StoreReader};
use ndarray::{Array2, Array3, Ix3};

use super::{Accumulator, Batch, BatchError, BatchInputs, check_shape, embed_tokens, numeric_label, open_split};
use crate::config::BatchSection;
use crate::pool::{PoolConfig, PoolStream, WorkerPool};
use crate::preprocess::PreprocessedRecord;

/// Lines handed to one worker at a time.
pub const DEFAULT_BACKED_CHUNK: usize = 10;

type RowResult = Result<Option<EncodedRow>, BatchError>;

/// One record turned into its tensor row by a pool worker.
struct EncodedRow {
    inputs: Array2<f32>,
    label: f32,
}

/// Same batches as [`super::EmbeddedBatches`], with lookups against a
/// [`BackedStore`] spread over a worker pool.
///
/// Each pass runs a fresh pool over the split file; every worker holds its
/// own [`StoreReader`] on the shared database. Rows are assembled in
/// completion order, so batch composition within a pass is not stable
/// across runs when more than one worker is used.
pub struct BackedBatches {
    path: PathBuf,
    store: BackedStore,
    max_words: usize,
    pool: PoolConfig,
    acc: Accumulator<Ix3>,
    stream: Option<PoolStream<RowResult>>,
    batches_in_pass: u64,
    finished: bool,
}

impl BackedBatches {
    pub fn new(path: impl AsRef<Path>, store: BackedStore, batch_size: usize, max_words: usize) -> Result<Self, BatchError> {
        check_shape(batch_size, &[max_words])?;
        let path = path.as_ref();
        open_split(path)?;

        let acc = Accumulator::new(Array3::zeros((batch_size, max_words, store.dim())), 1);
        Ok(Self {
            path: path.to_path_buf(),
            store,
            max_words,
            pool: PoolConfig::default().with_chunk_size(DEFAULT_BACKED_CHUNK),
            acc,
            stream: None,
            batches_in_pass: 0,
            finished: false,
        })
    }

    /// Shape from `batch_size` and `max_words_content`; worker chunks of
    /// `backed_chunk_size` lines.
    pub fn from_config(path: impl AsRef<Path>, store: BackedStore, cfg: &BatchSection) -> Result<Self, BatchError> {
        Ok(Self::new(path, store, cfg.batch_size, cfg.max_words_content)?.with_chunk_size(cfg.backed_chunk_size))
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = self.pool.with_workers(workers);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.pool = self.pool.with_chunk_size(chunk_size);
        self
    }

    fn start_pass(&mut self) -> Result<(), BatchError> {
        let lines = open_split(&self.path)?.lines();
        let store = self.store.clone();
        let path = self.path.clone();
        let max_words = self.max_words;

        let stream = WorkerPool::run(
            lines,
            &self.pool,
            move |_| store.reader(),
            move |reader: &mut StoreReader, line| encode_line(reader, &path, line, max_words),
        )?;
        self.stream = Some(stream);
        Ok(())
    }

    fn end_pass(&mut self) -> Option<BatchError> {
        self.stream = None;
        self.acc.reset();
        if self.batches_in_pass == 0 {
            self.finished = true;
            tracing::warn!(path = %self.path.display(), "pass produced no complete batch");
            return Some(BatchError::EmptyPass(self.path.clone()));
        }
        tracing::debug!(path = %self.path.display(), batches = self.batches_in_pass, "pass complete, restarting");
        self.batches_in_pass = 0;
        None
    }
}

impl Iterator for BackedBatches {
    type Item = Result<Batch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.stream.is_none() {
                if let Err(err) = self.start_pass() {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
            let stream = self.stream.as_mut()?;

            let row = match stream.next() {
                None => match self.end_pass() {
                    Some(err) => return Some(Err(err)),
                    None => continue,
                },
                Some(Err(err)) => {
                    tracing::error!(path = %self.path.display(), error = %err, "embedding pool failed");
                    self.stream = None;
                    self.finished = true;
                    return Some(Err(err.into()));
                }
                Some(Ok(Err(err))) => return Some(Err(err)),
                Some(Ok(Ok(None))) => continue,
                Some(Ok(Ok(Some(row)))) => row,
            };

            let (mut inputs, mut labels) = self.acc.row();
            inputs.assign(&row.inputs);
            labels[0] = row.label;
            if self.acc.commit_row() {
                self.batches_in_pass += 1;
                let (inputs, labels) = self.acc.take();
                return Some(Ok(Batch {
                    inputs: BatchInputs::Embedded(inputs),
                    labels,
                }));
            }
        }
    }
}

fn encode_line(reader: &StoreReader, path: &Path, line: io::Result<String>, max_words: usize) -> RowResult {
    let line = line.map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = line.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let record: PreprocessedRecord = match serde_json::from_str(text) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "skipping malformed split line");
            return Ok(None);
        }
    };
    let Some(label) = numeric_label(&record, path) else {
        return Ok(None);
    };

    let mut inputs = Array2::zeros((max_words, reader.dim()));
    embed_tokens(reader, &record.content, inputs.view_mut())?;
    Ok(Some(EncodedRow { inputs, label }))
}
