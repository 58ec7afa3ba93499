use std::path::Path;

use embedding::EmbeddingResolver;
use ndarray::{Array3, Ix3};

use crate::config::BatchSection;

use super::{Accumulator, Batch, BatchError, BatchInputs, SplitCursor, check_shape, embed_tokens, next_batch, numeric_label};

/// Content embeddings with a single numeric label column.
pub struct EmbeddedBatches<R> {
    cursor: SplitCursor,
    resolver: R,
    acc: Accumulator<Ix3>,
}

impl<R: EmbeddingResolver> EmbeddedBatches<R> {
    /// Fails immediately when `path` does not exist.
    pub fn new(path: impl AsRef<Path>, resolver: R, batch_size: usize, max_words: usize) -> Result<Self, BatchError> {
        check_shape(batch_size, &[max_words])?;
        let cursor = SplitCursor::open(path.as_ref())?;
        let acc = Accumulator::new(Array3::zeros((batch_size, max_words, resolver.dim())), 1);
        Ok(Self {
            cursor,
            resolver,
            acc,
        })
    }

    /// Shape from the `batch` config section: `batch_size` and `max_words_content`.
    pub fn from_config(path: impl AsRef<Path>, resolver: R, cfg: &BatchSection) -> Result<Self, BatchError> {
        Self::new(path, resolver, cfg.batch_size, cfg.max_words_content)
    }
}

impl<R: EmbeddingResolver> Iterator for EmbeddedBatches<R> {
    type Item = Result<Batch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.cursor.path().to_path_buf();
        let resolver = &self.resolver;
        let batch = next_batch(&mut self.cursor, &mut self.acc, |_, record, inputs, mut labels| {
            let Some(label) = numeric_label(record, &path) else {
                return Ok(false);
            };
            embed_tokens(resolver, &record.content, inputs)?;
            labels[0] = label;
            Ok(true)
        })?;

        Some(batch.map(|(inputs, labels)| Batch {
            inputs: BatchInputs::Embedded(inputs),
            labels,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::test_support::{binary_split, numbered_table};
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn hundred_records_make_ten_batches_per_pass() {
        let dir = TempDir::new().unwrap();
        let path = binary_split(dir.path(), 100);
        let table = numbered_table();
        let batches = EmbeddedBatches::new(&path, &table, 10, 4).unwrap();

        let first_pass: Vec<Batch> = batches.take(10).map(Result::unwrap).collect();
        let mut seen = HashSet::new();
        for batch in &first_pass {
            let BatchInputs::Embedded(inputs) = &batch.inputs else {
                panic!("expected embedded inputs");
            };
            assert_eq!(inputs.shape(), &[10, 4, 2]);
            assert_eq!(batch.labels.shape(), &[10, 1]);
            for row in 0..10 {
                seen.insert(inputs[[row, 0, 0]] as usize);
            }
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn config_section_sets_shape() {
        let dir = TempDir::new().unwrap();
        let path = binary_split(dir.path(), 20);
        let table = numbered_table();
        let cfg = BatchSection {
            batch_size: 4,
            max_words_content: 7,
            ..BatchSection::default()
        };
        let batch = EmbeddedBatches::from_config(&path, &table, &cfg)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        let BatchInputs::Embedded(inputs) = &batch.inputs else {
            panic!("expected embedded inputs");
        };
        assert_eq!(inputs.shape(), &[4, 7, 2]);
        assert_eq!(batch.labels.shape(), &[4, 1]);
    }

    #[test]
    fn trailing_records_are_dropped_at_restart() {
        let dir = TempDir::new().unwrap();
        let path = binary_split(dir.path(), 103);
        let table = numbered_table();
        let mut batches = EmbeddedBatches::new(&path, &table, 10, 1).unwrap();

        let mut values = Vec::new();
        for _ in 0..20 {
            let batch = batches.next().unwrap().unwrap();
            let BatchInputs::Embedded(inputs) = &batch.inputs else {
                unreachable!()
            };
            values.extend(inputs.iter().step_by(2).copied());
        }

        // Records 100..=102 never appear; the second pass restarts at record 0.
        assert!(values.iter().all(|v| *v < 100.0));
        assert_eq!(values[100], 0.0);
        assert_eq!(values[101], 1.0);
    }

    #[test]
    fn labels_follow_records() {
        let dir = TempDir::new().unwrap();
        let path = binary_split(dir.path(), 10);
        let table = numbered_table();
        let batch = EmbeddedBatches::new(&path, &table, 10, 1)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        let BatchInputs::Embedded(inputs) = &batch.inputs else {
            unreachable!()
        };
        for row in 0..10 {
            let id = inputs[[row, 0, 0]] as usize;
            assert_eq!(batch.labels[[row, 0]], (id % 2) as f32);
        }
    }

    #[test]
    fn too_short_file_ends_with_empty_pass() {
        let dir = TempDir::new().unwrap();
        let path = binary_split(dir.path(), 3);
        let table = numbered_table();
        let mut batches = EmbeddedBatches::new(&path, &table, 10, 1).unwrap();

        assert!(matches!(batches.next(), Some(Err(BatchError::EmptyPass(_)))));
        assert!(batches.next().is_none());
    }

    #[test]
    fn missing_split_is_fatal() {
        let dir = TempDir::new().unwrap();
        let table = numbered_table();
        let err = EmbeddedBatches::new(dir.path().join("absent.jsonl"), &table, 10, 1)
            .err()
            .unwrap();
        assert!(matches!(err, BatchError::MissingInput(_)));
    }
}
