use std::path::Path;
use std::sync::Arc;

use embedding::VocabularyIndex;
use ndarray::{Array2, Ix2};

use crate::config::BatchSection;

use super::{Accumulator, Batch, BatchError, BatchInputs, SplitCursor, check_shape, next_batch, numeric_label};

/// Vocabulary indices instead of vectors, for models with their own
/// embedding layer. Unknown tokens and padding are index 0.
pub struct IndexedBatches {
    cursor: SplitCursor,
    vocab: Arc<VocabularyIndex>,
    acc: Accumulator<Ix2>,
}

impl IndexedBatches {
    pub fn new(
        path: impl AsRef<Path>,
        vocab: Arc<VocabularyIndex>,
        batch_size: usize,
        max_words: usize,
    ) -> Result<Self, BatchError> {
        check_shape(batch_size, &[max_words])?;
        Ok(Self {
            cursor: SplitCursor::open(path.as_ref())?,
            vocab,
            acc: Accumulator::new(Array2::zeros((batch_size, max_words)), 1),
        })
    }

    pub fn from_config(path: impl AsRef<Path>, vocab: Arc<VocabularyIndex>, cfg: &BatchSection) -> Result<Self, BatchError> {
        Self::new(path, vocab, cfg.batch_size, cfg.max_words_content)
    }
}

impl Iterator for IndexedBatches {
    type Item = Result<Batch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.cursor.path().to_path_buf();
        let vocab = &self.vocab;
        let batch = next_batch(&mut self.cursor, &mut self.acc, |_, record, mut inputs, mut labels| {
            let Some(label) = numeric_label(record, &path) else {
                return Ok(false);
            };
            for (token, slot) in record.content.iter().zip(inputs.iter_mut()) {
                *slot = vocab.index_of(token) as f32;
            }
            labels[0] = label;
            Ok(true)
        })?;

        Some(batch.map(|(inputs, labels)| Batch {
            inputs: BatchInputs::Indexed(inputs),
            labels,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn tokens_become_indices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.jsonl");
        fs::write(
            &path,
            "{\"id\":1,\"content\":[\"senat\",\"mystery\",\"vote\",\"bill\"],\"label\":1}\n\
             {\"id\":2,\"content\":[\"vote\"],\"label\":0}\n",
        )
        .unwrap();

        let vocab = Arc::new(VocabularyIndex::from_tokens(["senat", "vote", "bill"]));
        let batch = IndexedBatches::new(&path, vocab, 2, 3)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        let BatchInputs::Indexed(inputs) = &batch.inputs else {
            panic!("expected indexed inputs");
        };
        assert_eq!(inputs.shape(), &[2, 3]);
        assert_eq!(inputs.row(0).to_vec(), vec![1.0, 0.0, 2.0]);
        assert_eq!(inputs.row(1).to_vec(), vec![2.0, 0.0, 0.0]);
        assert_eq!(batch.labels.column(0).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn class_labels_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.jsonl");
        fs::write(
            &path,
            "{\"id\":1,\"content\":[\"vote\"],\"label\":\"fake\"}\n\
             {\"id\":2,\"content\":[\"vote\"],\"label\":1}\n",
        )
        .unwrap();

        let vocab = Arc::new(VocabularyIndex::from_tokens(["vote"]));
        let mut batches = IndexedBatches::new(&path, vocab, 1, 1).unwrap();
        let batch = batches.next().unwrap().unwrap();
        assert_eq!(batch.labels[[0, 0]], 1.0);
    }
}
