use std::path::Path;

use embedding::EmbeddingResolver;
use ingest::{BINARY_LABELS, RELIABLE_LABEL};
use ndarray::{Array3, Axis, Ix3};

use crate::config::BatchSection;

use super::{Accumulator, Batch, BatchError, BatchInputs, SplitCursor, check_shape, embed_tokens, next_batch};

/// Title and content embeddings from a separate-mode split, restricted to
/// the four binary classes. `reliable` is labelled 1, the rest 0.
pub struct SeparateBatches<R> {
    cursor: SplitCursor,
    resolver: R,
    title: Array3<f32>,
    content: Accumulator<Ix3>,
}

impl<R: EmbeddingResolver> SeparateBatches<R> {
    pub fn new(
        path: impl AsRef<Path>,
        resolver: R,
        batch_size: usize,
        max_words_title: usize,
        max_words_content: usize,
    ) -> Result<Self, BatchError> {
        check_shape(batch_size, &[max_words_title, max_words_content])?;
        let dim = resolver.dim();
        Ok(Self {
            cursor: SplitCursor::open(path.as_ref())?,
            title: Array3::zeros((batch_size, max_words_title, dim)),
            content: Accumulator::new(Array3::zeros((batch_size, max_words_content, dim)), 1),
            resolver,
        })
    }

    /// Title and content lengths from `max_words_title` and `max_words_content`.
    pub fn from_config(path: impl AsRef<Path>, resolver: R, cfg: &BatchSection) -> Result<Self, BatchError> {
        Self::new(path, resolver, cfg.batch_size, cfg.max_words_title, cfg.max_words_content)
    }
}

impl<R: EmbeddingResolver> Iterator for SeparateBatches<R> {
    type Item = Result<Batch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.cursor.path().to_path_buf();
        let resolver = &self.resolver;
        let title = &mut self.title;
        let batch = next_batch(&mut self.cursor, &mut self.content, |row, record, content, mut labels| {
            let Some(class) = record.label.as_class() else {
                tracing::warn!(id = record.id, path = %path.display(), "skipping record without a class label");
                return Ok(false);
            };
            if !BINARY_LABELS.contains(&class) {
                return Ok(false);
            }
            let Some(title_tokens) = record.title.as_deref() else {
                tracing::warn!(id = record.id, path = %path.display(), "skipping record without title tokens");
                return Ok(false);
            };

            let mut title_row = title.index_axis_mut(Axis(0), row);
            title_row.fill(0.0);
            embed_tokens(resolver, title_tokens, title_row)?;
            embed_tokens(resolver, &record.content, content)?;
            labels[0] = if class == RELIABLE_LABEL { 1.0 } else { 0.0 };
            Ok(true)
        })?;

        Some(batch.map(|(content, labels)| {
            let title_dim = self.title.raw_dim();
            let title = std::mem::replace(&mut self.title, Array3::zeros(title_dim));
            Batch {
                inputs: BatchInputs::TitleContent { title, content },
                labels,
            }
        }))
    }
}
