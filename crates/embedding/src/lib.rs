//! Token embedding resolution.
//!
//! Two resolvers share the [`EmbeddingResolver`] contract:
//!
//! * [`ResidentTable`] keeps every vector in memory and is loaded from the
//!   word2vec/fastText text format.
//! * [`BackedStore`] keeps vectors in a redb file. It is opened once and
//!   each worker thread queries it through its own [`StoreReader`].
//!
//! Unknown tokens are not errors; they resolve to `None` and batch builders
//! leave the corresponding row zeroed.
//!
//! ```rust
//! use embedding::{EmbeddingResolver, ResidentTable};
//!
//! let table = ResidentTable::from_entries(2, [("senat", vec![0.5, 1.0])]).unwrap();
//! let mut row = [0.0f32; 2];
//! assert!(table.resolve_into("senat", &mut row).unwrap());
//! assert!(!table.resolve_into("filibust", &mut row).unwrap());
//! ```

mod error;
mod resident;
mod store;
mod vocab;

use std::sync::Arc;

pub use error::EmbeddingError;
pub use resident::ResidentTable;
pub use store::{BackedStore, StoreReader};
pub use vocab::VocabularyIndex;

/// Dimension of the pretrained vectors the batch builders are sized for.
pub const EMBEDDING_DIM: usize = 100;

/// Lookup contract shared by every embedding source.
pub trait EmbeddingResolver {
    /// Vector dimension; every resolved vector has exactly this length.
    fn dim(&self) -> usize;

    /// Vector for `token`, or `None` when the token is unknown.
    fn resolve(&self, token: &str) -> Result<Option<Vec<f32>>, EmbeddingError>;

    /// Copy the vector for `token` into `out` and return `true`, or leave
    /// `out` untouched and return `false` when the token is unknown.
    fn resolve_into(&self, token: &str, out: &mut [f32]) -> Result<bool, EmbeddingError> {
        match self.resolve(token)? {
            Some(vector) => {
                if vector.len() != out.len() {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: out.len(),
                        found: vector.len(),
                    });
                }
                out.copy_from_slice(&vector);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<R: EmbeddingResolver + ?Sized> EmbeddingResolver for Arc<R> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn resolve(&self, token: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        (**self).resolve(token)
    }

    fn resolve_into(&self, token: &str, out: &mut [f32]) -> Result<bool, EmbeddingError> {
        (**self).resolve_into(token, out)
    }
}

impl<R: EmbeddingResolver + ?Sized> EmbeddingResolver for &R {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn resolve(&self, token: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        (**self).resolve(token)
    }

    fn resolve_into(&self, token: &str, out: &mut [f32]) -> Result<bool, EmbeddingError> {
        (**self).resolve_into(token, out)
    }
}
