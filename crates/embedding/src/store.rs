//! redb-backed embedding store.
//!
//! Vectors are stored as little-endian `f32` bytes keyed by token. The
//! database is opened once per process and shared; each worker thread takes
//! its own [`StoreReader`], which pins a read transaction for its lifetime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{
    Database, ReadOnlyTable, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};

use crate::error::EmbeddingError;
use crate::EmbeddingResolver;

const EMBEDDINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const DIM_KEY: &str = "dim";

/// Handle to an on-disk embedding store.
///
/// Cloning is cheap; every clone shares the same underlying database.
#[derive(Clone)]
pub struct BackedStore {
    db: Arc<Database>,
    dim: usize,
    path: PathBuf,
}

impl std::fmt::Debug for BackedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackedStore")
            .field("path", &self.path)
            .field("dim", &self.dim)
            .finish()
    }
}

impl BackedStore {
    /// Open an existing store. A missing file is reported as
    /// [`EmbeddingError::StoreMissing`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EmbeddingError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EmbeddingError::StoreMissing(path.to_path_buf()));
        }

        let db = Database::open(path).map_err(EmbeddingError::store)?;
        let dim = {
            let txn = db.begin_read().map_err(EmbeddingError::store)?;
            let meta = txn.open_table(META).map_err(EmbeddingError::store)?;
            let guard = meta
                .get(DIM_KEY)
                .map_err(EmbeddingError::store)?
                .ok_or_else(|| EmbeddingError::Store("store has no recorded dimension".into()))?;
            guard.value() as usize
        };

        tracing::debug!(path = %path.display(), dim, "opened embedding store");
        Ok(Self {
            db: Arc::new(db),
            dim,
            path: path.to_path_buf(),
        })
    }

    /// Create (or overwrite) a store at `path` from `(token, vector)` pairs,
    /// all written in a single transaction.
    pub fn build<I, S>(path: impl AsRef<Path>, dim: usize, entries: I) -> Result<Self, EmbeddingError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: AsRef<str>,
    {
        let path = path.as_ref();
        let db = Database::create(path).map_err(EmbeddingError::store)?;

        let mut written = 0usize;
        let txn = db.begin_write().map_err(EmbeddingError::store)?;
        {
            let mut meta = txn.open_table(META).map_err(EmbeddingError::store)?;
            meta.insert(DIM_KEY, dim as u64).map_err(EmbeddingError::store)?;

            let mut table = txn.open_table(EMBEDDINGS).map_err(EmbeddingError::store)?;
            for (token, vector) in entries {
                if vector.len() != dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dim,
                        found: vector.len(),
                    });
                }
                let bytes = encode(&vector);
                table
                    .insert(token.as_ref(), bytes.as_slice())
                    .map_err(EmbeddingError::store)?;
                written += 1;
            }
        }
        txn.commit().map_err(EmbeddingError::store)?;

        tracing::info!(path = %path.display(), tokens = written, dim, "built embedding store");
        Ok(Self {
            db: Arc::new(db),
            dim,
            path: path.to_path_buf(),
        })
    }

    /// Open a reader bound to a fresh read transaction.
    pub fn reader(&self) -> Result<StoreReader, EmbeddingError> {
        let txn = self.db.begin_read().map_err(EmbeddingError::store)?;
        let table = txn.open_table(EMBEDDINGS).map_err(EmbeddingError::store)?;
        Ok(StoreReader {
            table,
            dim: self.dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored tokens.
    pub fn len(&self) -> Result<u64, EmbeddingError> {
        let txn = self.db.begin_read().map_err(EmbeddingError::store)?;
        let table = txn.open_table(EMBEDDINGS).map_err(EmbeddingError::store)?;
        table.len().map_err(EmbeddingError::store)
    }

    pub fn is_empty(&self) -> Result<bool, EmbeddingError> {
        Ok(self.len()? == 0)
    }
}

/// Per-thread view over a [`BackedStore`].
pub struct StoreReader {
    table: ReadOnlyTable<&'static str, &'static [u8]>,
    dim: usize,
}

impl EmbeddingResolver for StoreReader {
    fn dim(&self) -> usize {
        self.dim
    }

    fn resolve(&self, token: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        let Some(guard) = self.table.get(token).map_err(EmbeddingError::store)? else {
            return Ok(None);
        };
        let mut vector = vec![0.0f32; self.dim];
        decode_into(guard.value(), &mut vector)?;
        Ok(Some(vector))
    }

    fn resolve_into(&self, token: &str, out: &mut [f32]) -> Result<bool, EmbeddingError> {
        let Some(guard) = self.table.get(token).map_err(EmbeddingError::store)? else {
            return Ok(false);
        };
        decode_into(guard.value(), out)?;
        Ok(true)
    }
}

fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_into(bytes: &[u8], out: &mut [f32]) -> Result<(), EmbeddingError> {
    if bytes.len() != out.len() * 4 {
        return Err(EmbeddingError::DimensionMismatch {
            expected: out.len(),
            found: bytes.len() / 4,
        });
    }
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}
