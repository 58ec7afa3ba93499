use std::path::Path;

use embedding::EmbeddingResolver;
use ndarray::{Array3, Ix3};

use crate::config::BatchSection;

use super::{Accumulator, Batch, BatchError, BatchInputs, NEWS_LABELS, SplitCursor, check_shape, embed_tokens, next_batch};

/// Content embeddings with a one-hot label over a fixed class list.
///
/// Records labelled outside the list are skipped.
pub struct MultiLabelBatches<R> {
    cursor: SplitCursor,
    resolver: R,
    labels: Vec<String>,
    acc: Accumulator<Ix3>,
}

impl<R: EmbeddingResolver> MultiLabelBatches<R> {
    /// One-hot over [`NEWS_LABELS`].
    pub fn new(path: impl AsRef<Path>, resolver: R, batch_size: usize, max_words: usize) -> Result<Self, BatchError> {
        Self::with_labels(path, resolver, batch_size, max_words, NEWS_LABELS)
    }

    pub fn from_config(path: impl AsRef<Path>, resolver: R, cfg: &BatchSection) -> Result<Self, BatchError> {
        Self::new(path, resolver, cfg.batch_size, cfg.max_words_content)
    }

    /// One-hot over `labels`; column `i` is `labels[i]`.
    pub fn with_labels<I, S>(
        path: impl AsRef<Path>,
        resolver: R,
        batch_size: usize,
        max_words: usize,
        labels: I,
    ) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_shape(batch_size, &[max_words])?;
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(BatchError::InvalidConfig("label list must not be empty".into()));
        }

        let acc = Accumulator::new(Array3::zeros((batch_size, max_words, resolver.dim())), labels.len());
        Ok(Self {
            cursor: SplitCursor::open(path.as_ref())?,
            resolver,
            labels,
            acc,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl<R: EmbeddingResolver> Iterator for MultiLabelBatches<R> {
    type Item = Result<Batch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.cursor.path().to_path_buf();
        let resolver = &self.resolver;
        let known = &self.labels;
        let batch = next_batch(&mut self.cursor, &mut self.acc, |_, record, inputs, mut labels| {
            let Some(class) = record.label.as_class() else {
                tracing::warn!(id = record.id, path = %path.display(), "skipping record without a class label");
                return Ok(false);
            };
            let Some(column) = known.iter().position(|label| label == class) else {
                tracing::debug!(id = record.id, label = class, "label outside the class list, skipped");
                return Ok(false);
            };
            embed_tokens(resolver, &record.content, inputs)?;
            labels[column] = 1.0;
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
    use embedding::ResidentTable;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn satire_is_one_hot_and_unknown_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.jsonl");
        fs::write(
            &path,
            "{\"id\":1,\"content\":[\"joke\"],\"label\":\"unknown\"}\n\
             {\"id\":2,\"content\":[\"joke\"],\"label\":\"satire\"}\n",
        )
        .unwrap();

        let table = ResidentTable::from_entries(1, [("joke", vec![4.0])]).unwrap();
        let batch = MultiLabelBatches::new(&path, &table, 1, 2)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(batch.label_width(), 11);
        let satire = NEWS_LABELS.iter().position(|l| *l == "satire").unwrap();
        for (column, value) in batch.labels.row(0).iter().enumerate() {
            assert_eq!(*value, if column == satire { 1.0 } else { 0.0 });
        }
        let BatchInputs::Embedded(inputs) = &batch.inputs else {
            unreachable!()
        };
        assert_eq!(inputs[[0, 0, 0]], 4.0);
        assert_eq!(inputs[[0, 1, 0]], 0.0);
    }

    #[test]
    fn only_unknown_labels_is_an_empty_pass() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.jsonl");
        fs::write(&path, "{\"id\":1,\"content\":[],\"label\":\"unknown\"}\n").unwrap();

        let table = ResidentTable::new(1);
        let mut batches = MultiLabelBatches::new(&path, &table, 1, 1).unwrap();
        assert!(matches!(batches.next(), Some(Err(BatchError::EmptyPass(_)))));
        assert!(batches.next().is_none());
    }

    #[test]
    fn custom_label_list_sets_width() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.jsonl");
        fs::write(&path, "{\"id\":1,\"content\":[],\"label\":\"fake\"}\n").unwrap();

        let table = ResidentTable::new(1);
        let batch = MultiLabelBatches::with_labels(&path, &table, 1, 1, ["reliable", "fake"])
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(batch.labels.row(0).to_vec(), vec![0.0, 1.0]);
    }
}
