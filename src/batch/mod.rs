//! Fixed-shape batch generators over split files.
//!
//! Every generator is an endless iterator: it reads its split file top to
//! bottom, and at end of file reopens it and starts the next pass. A batch is
//! yielded only once `batch_size` usable records have accumulated, so each
//! pass yields `floor(N / batch_size)` batches and the remainder of the pass
//! is discarded, never carried over.
//!
//! | Generator             | Inputs                                   | Labels               |
//! |-----------------------|------------------------------------------|----------------------|
//! | [`EmbeddedBatches`]   | `(batch, max_words, dim)`                | `(batch, 1)` numeric |
//! | [`IndexedBatches`]    | `(batch, max_words)` vocabulary indices  | `(batch, 1)` numeric |
//! | [`SeparateBatches`]   | title and content `(batch, len, dim)`    | `(batch, 1)` reliable |
//! | [`MultiLabelBatches`] | `(batch, max_words, dim)`                | `(batch, labels)` one-hot |
//! | [`BackedBatches`]     | `(batch, max_words, dim)` via redb pool  | `(batch, 1)` numeric |
//!
//! Tokens past `max_words` are truncated. Tokens the resolver does not know
//! leave their row of the tensor at zero.
//!
//! A pass that cannot fill a single batch yields [`BatchError::EmptyPass`]
//! once and ends the iterator.

mod backed;
mod embedded;
mod indexed;
mod multilabel;
mod separate;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use embedding::{EmbeddingError, EmbeddingResolver};
use ndarray::{Array, Array2, Array3, ArrayView1, ArrayViewMut, ArrayViewMut1, ArrayViewMut2, Axis, Dimension, RemoveAxis};
use thiserror::Error;

use crate::pool::PoolError;
use crate::preprocess::PreprocessedRecord;

pub use backed::{BackedBatches, DEFAULT_BACKED_CHUNK};
pub use embedded::EmbeddedBatches;
pub use indexed::IndexedBatches;
pub use multilabel::MultiLabelBatches;
pub use separate::SeparateBatches;

/// Default label list of the multi-label generator. Column `i` of the label
/// tensor is `NEWS_LABELS[i]`; consumers depend on this order.
pub const NEWS_LABELS: [&str; 11] = [
    "bias",
    "clickbait",
    "conspiracy",
    "fake",
    "hate",
    "junksci",
    "political",
    "reliable",
    "rumor",
    "satire",
    "unreliable",
];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("split file {0} does not exist")]
    MissingInput(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("embedding lookup failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("a full pass over {0} produced no complete batch")]
    EmptyPass(PathBuf),

    #[error("invalid batch configuration: {0}")]
    InvalidConfig(String),
}

/// Model inputs of one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInputs {
    Embedded(Array3<f32>),
    Indexed(Array2<f32>),
    TitleContent { title: Array3<f32>, content: Array3<f32> },
}

/// One fixed-shape batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: BatchInputs,
    /// `(batch_size, label_width)`.
    pub labels: Array2<f32>,
}

impl Batch {
    pub fn batch_size(&self) -> usize {
        self.labels.nrows()
    }

    pub fn label_width(&self) -> usize {
        self.labels.ncols()
    }
}

pub(crate) fn check_shape(batch_size: usize, max_words: &[usize]) -> Result<(), BatchError> {
    if batch_size == 0 {
        return Err(BatchError::InvalidConfig("batch_size must be > 0".into()));
    }
    if max_words.contains(&0) {
        return Err(BatchError::InvalidConfig("max_words must be > 0".into()));
    }
    Ok(())
}

pub(crate) fn open_split(path: &Path) -> Result<BufReader<File>, BatchError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BatchError::MissingInput(path.to_path_buf())),
        Err(source) => Err(BatchError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Numeric label of `record`, or `None` (logged) when the split carries
/// class names instead.
pub(crate) fn numeric_label(record: &PreprocessedRecord, path: &Path) -> Option<f32> {
    match record.label.as_numeric() {
        Some(value) => Some(value as f32),
        None => {
            tracing::warn!(
                id = record.id,
                label = %record.label,
                path = %path.display(),
                "skipping record without a numeric label"
            );
            None
        }
    }
}

/// Write the vectors of `tokens` into the rows of `out`. Extra tokens are
/// ignored; unknown tokens leave their row untouched.
pub(crate) fn embed_tokens<R>(resolver: &R, tokens: &[String], mut out: ArrayViewMut2<'_, f32>) -> Result<(), EmbeddingError>
where
    R: EmbeddingResolver + ?Sized,
{
    for (token, mut row) in tokens.iter().zip(out.rows_mut()) {
        match row.as_slice_mut() {
            Some(slot) => {
                resolver.resolve_into(token, slot)?;
            }
            None => {
                if let Some(vector) = resolver.resolve(token)? {
                    row.assign(&ArrayView1::from(vector.as_slice()));
                }
            }
        }
    }
    Ok(())
}

/// Outcome of one read from a [`SplitCursor`].
pub(crate) enum Step {
    Record(PreprocessedRecord),
    /// End of file reached; the cursor already reopened the file.
    PassEnd,
}

/// Sequential reader over a split file that restarts at end of file.
pub(crate) struct SplitCursor {
    path: PathBuf,
    reader: BufReader<File>,
    line: String,
    line_no: u64,
    batches_in_pass: u64,
    finished: bool,
}

impl SplitCursor {
    pub(crate) fn open(path: &Path) -> Result<Self, BatchError> {
        Ok(Self {
            reader: open_split(path)?,
            path: path.to_path_buf(),
            line: String::new(),
            line_no: 0,
            batches_in_pass: 0,
            finished: false,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn batch_emitted(&mut self) {
        self.batches_in_pass += 1;
    }

    /// Next parseable record, a pass boundary, or `None` once the cursor has
    /// given up after an empty pass.
    pub(crate) fn next_step(&mut self) -> Result<Option<Step>, BatchError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.line.clear();
            let read = self.reader.read_line(&mut self.line).map_err(|source| BatchError::Io {
                path: self.path.clone(),
                source,
            })?;

            if read == 0 {
                if self.batches_in_pass == 0 {
                    self.finished = true;
                    tracing::warn!(path = %self.path.display(), "pass produced no complete batch");
                    return Err(BatchError::EmptyPass(self.path.clone()));
                }
                tracing::debug!(path = %self.path.display(), batches = self.batches_in_pass, "pass complete, restarting");
                self.batches_in_pass = 0;
                self.line_no = 0;
                self.reader = open_split(&self.path)?;
                return Ok(Some(Step::PassEnd));
            }

            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<PreprocessedRecord>(text) {
                Ok(record) => return Ok(Some(Step::Record(record))),
                Err(err) => tracing::warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    error = %err,
                    "skipping malformed split line"
                ),
            }
        }
    }
}

/// Batch buffers being filled row by row.
pub(crate) struct Accumulator<D: Dimension> {
    inputs: Array<f32, D>,
    labels: Array2<f32>,
    filled: usize,
}

impl<D: Dimension + RemoveAxis> Accumulator<D> {
    /// `inputs` fixes the input shape; its first axis is the batch size.
    pub(crate) fn new(inputs: Array<f32, D>, label_width: usize) -> Self {
        let batch_size = inputs.len_of(Axis(0));
        Self {
            inputs,
            labels: Array2::zeros((batch_size, label_width)),
            filled: 0,
        }
    }

    pub(crate) fn filled(&self) -> usize {
        self.filled
    }

    /// Zeroed views of the next free row.
    pub(crate) fn row(&mut self) -> (ArrayViewMut<'_, f32, D::Smaller>, ArrayViewMut1<'_, f32>) {
        let mut inputs = self.inputs.index_axis_mut(Axis(0), self.filled);
        inputs.fill(0.0);
        let mut labels = self.labels.row_mut(self.filled);
        labels.fill(0.0);
        (inputs, labels)
    }

    /// Mark the current row as used. Returns `true` when the batch is full.
    pub(crate) fn commit_row(&mut self) -> bool {
        self.filled += 1;
        self.filled == self.labels.nrows()
    }

    /// Hand out the buffers and start a fresh batch.
    pub(crate) fn take(&mut self) -> (Array<f32, D>, Array2<f32>) {
        let input_dim = self.inputs.raw_dim();
        let label_dim = self.labels.raw_dim();
        self.filled = 0;
        (
            std::mem::replace(&mut self.inputs, Array::zeros(input_dim)),
            std::mem::replace(&mut self.labels, Array2::zeros(label_dim)),
        )
    }

    /// Discard partially filled rows.
    pub(crate) fn reset(&mut self) {
        self.filled = 0;
    }
}

/// Shared accumulation loop. `fill` receives the row index, the record and
/// the zeroed row views; it returns `Ok(false)` to skip the record.
pub(crate) fn next_batch<D, F>(
    cursor: &mut SplitCursor,
    acc: &mut Accumulator<D>,
    mut fill: F,
) -> Option<Result<(Array<f32, D>, Array2<f32>), BatchError>>
where
    D: Dimension + RemoveAxis,
    F: FnMut(usize, &PreprocessedRecord, ArrayViewMut<'_, f32, D::Smaller>, ArrayViewMut1<'_, f32>) -> Result<bool, BatchError>,
{
    loop {
        let record = match cursor.next_step() {
            Err(err) => return Some(Err(err)),
            Ok(None) => return None,
            Ok(Some(Step::PassEnd)) => {
                acc.reset();
                continue;
            }
            Ok(Some(Step::Record(record))) => record,
        };

        let row = acc.filled();
        let (inputs, labels) = acc.row();
        match fill(row, &record, inputs, labels) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => return Some(Err(err)),
        }

        if acc.commit_row() {
            cursor.batch_emitted();
            return Some(Ok(acc.take()));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Ix3;

    #[test]
    fn accumulator_reports_full_batches() {
        let mut acc: Accumulator<Ix3> = Accumulator::new(Array3::zeros((2, 3, 4)), 1);
        let (mut inputs, mut labels) = acc.row();
        inputs.fill(1.0);
        labels[0] = 1.0;
        assert!(!acc.commit_row());
        let _ = acc.row();
        assert!(acc.commit_row());

        let (inputs, labels) = acc.take();
        assert_eq!(inputs.shape(), &[2, 3, 4]);
        assert_eq!(inputs[[0, 2, 3]], 1.0);
        assert_eq!(inputs[[1, 0, 0]], 0.0);
        assert_eq!(labels[[0, 0]], 1.0);
        assert_eq!(acc.filled(), 0);
    }

    #[test]
    fn reused_rows_are_cleared() {
        let mut acc: Accumulator<Ix3> = Accumulator::new(Array3::zeros((2, 1, 1)), 1);
        let (mut inputs, _) = acc.row();
        inputs.fill(5.0);
        acc.commit_row();
        acc.reset();

        let (inputs, _) = acc.row();
        assert_eq!(inputs.sum(), 0.0);
    }

    #[test]
    fn embedding_truncates_and_zero_fills() {
        let table = test_support::numbered_table();
        let tokens: Vec<String> = ["w3", "unknown", "w5", "w7"].iter().map(|s| s.to_string()).collect();
        let mut out = Array2::<f32>::zeros((3, 2));

        embed_tokens(&table, &tokens, out.view_mut()).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![3.0, 3.0]);
        assert_eq!(out.row(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(out.row(2).to_vec(), vec![5.0, 5.0]);
    }

    #[test]
    fn label_order_is_fixed() {
        assert_eq!(NEWS_LABELS.len(), 11);
        assert_eq!(NEWS_LABELS.iter().position(|l| *l == "satire"), Some(9));
    }
}
