//! Fully resident embedding table.

use std::fs;
use std::path::Path;

use fxhash::FxHashMap;
use rayon::prelude::*;

use crate::error::EmbeddingError;
use crate::EmbeddingResolver;

/// Token → vector table held entirely in memory.
///
/// Read-only once built, so a shared reference (or `Arc`) can be handed to
/// any number of threads.
#[derive(Debug, Clone, Default)]
pub struct ResidentTable {
    dim: usize,
    vectors: FxHashMap<String, Vec<f32>>,
}

impl ResidentTable {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: FxHashMap::default(),
        }
    }

    /// Build a table from `(token, vector)` pairs. Every vector must have
    /// exactly `dim` components.
    pub fn from_entries<I, S>(dim: usize, entries: I) -> Result<Self, EmbeddingError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut table = Self::new(dim);
        for (token, vector) in entries {
            table.insert(token, vector)?;
        }
        Ok(table)
    }

    /// Insert or replace the vector of `token`.
    pub fn insert(&mut self, token: impl Into<String>, vector: Vec<f32>) -> Result<(), EmbeddingError> {
        if vector.len() != self.dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dim,
                found: vector.len(),
            });
        }
        self.vectors.insert(token.into(), vector);
        Ok(())
    }

    /// Load a table from the word2vec/fastText text format:
    ///
    /// ```text
    /// <count> <dim>
    /// <token> <v1> ... <v_dim>
    /// ```
    ///
    /// Lines are parsed in parallel. Blank lines are ignored.
    pub fn load_vec_file(path: impl AsRef<Path>) -> Result<Self, EmbeddingError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| EmbeddingError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = contents.lines();
        let header = lines.next().ok_or_else(|| EmbeddingError::Parse {
            line: 1,
            reason: "missing `<count> <dim>` header".into(),
        })?;
        let (declared, dim) = parse_header(header)?;

        let body: Vec<&str> = lines.collect();
        let entries = body
            .par_iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| parse_vector_line(line, dim, idx + 2))
            .collect::<Result<Vec<_>, _>>()?;

        if entries.len() != declared {
            tracing::warn!(
                declared,
                loaded = entries.len(),
                path = %path.display(),
                "embedding header count disagrees with file body"
            );
        }

        let mut vectors = FxHashMap::default();
        vectors.reserve(entries.len());
        vectors.extend(entries);
        tracing::info!(tokens = vectors.len(), dim, path = %path.display(), "loaded resident embedding table");

        Ok(Self { dim, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.vectors.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }

    /// All tokens in arbitrary order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.vectors
            .iter()
            .map(|(token, vector)| (token.as_str(), vector.as_slice()))
    }
}

impl EmbeddingResolver for ResidentTable {
    fn dim(&self) -> usize {
        self.dim
    }

    fn resolve(&self, token: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        Ok(self.get(token).map(<[f32]>::to_vec))
    }

    fn resolve_into(&self, token: &str, out: &mut [f32]) -> Result<bool, EmbeddingError> {
        match self.get(token) {
            Some(vector) => {
                if vector.len() != out.len() {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: out.len(),
                        found: vector.len(),
                    });
                }
                out.copy_from_slice(vector);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn parse_header(line: &str) -> Result<(usize, usize), EmbeddingError> {
    let bad = |reason: &str| EmbeddingError::Parse {
        line: 1,
        reason: reason.to_string(),
    };
    let mut parts = line.split_ascii_whitespace();
    let count = parts
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or_else(|| bad("header token count is not an integer"))?;
    let dim = parts
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or_else(|| bad("header dimension is not an integer"))?;
    if dim == 0 {
        return Err(bad("header dimension must be > 0"));
    }
    Ok((count, dim))
}

fn parse_vector_line(line: &str, dim: usize, line_no: usize) -> Result<(String, Vec<f32>), EmbeddingError> {
    let mut parts = line.split_ascii_whitespace();
    let token = parts.next().ok_or_else(|| EmbeddingError::Parse {
        line: line_no,
        reason: "missing token".into(),
    })?;

    let mut vector = Vec::with_capacity(dim);
    for raw in parts {
        let value = raw.parse::<f32>().map_err(|e| EmbeddingError::Parse {
            line: line_no,
            reason: format!("component `{raw}`: {e}"),
        })?;
        vector.push(value);
    }
    if vector.len() != dim {
        return Err(EmbeddingError::Parse {
            line: line_no,
            reason: format!("expected {dim} components, found {}", vector.len()),
        });
    }
    Ok((token.to_string(), vector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_vec_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_text_vectors() {
        let file = write_vec_file("2 3\nsenat 0.1 0.2 0.3\nvote 1 2 3\n\n");
        let table = ResidentTable::load_vec_file(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dim(), 3);
        assert_eq!(table.get("vote"), Some(&[1.0f32, 2.0, 3.0][..]));
    }

    #[test]
    fn wrong_component_count_is_a_parse_error() {
        let file = write_vec_file("1 3\nsenat 0.1 0.2\n");
        let err = ResidentTable::load_vec_file(file.path()).unwrap_err();
        assert!(matches!(err, EmbeddingError::Parse { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ResidentTable::load_vec_file("/no/such/vectors.vec").unwrap_err();
        assert!(matches!(err, EmbeddingError::Io { .. }));
    }

    #[test]
    fn unknown_tokens_resolve_to_none() {
        let table = ResidentTable::from_entries(2, [("known", vec![1.0, 1.0])]).unwrap();
        assert_eq!(table.resolve("unknown").unwrap(), None);

        let mut row = [0.0f32; 2];
        assert!(!table.resolve_into("unknown", &mut row).unwrap());
        assert_eq!(row, [0.0, 0.0]);
        assert!(table.resolve_into("known", &mut row).unwrap());
        assert_eq!(row, [1.0, 1.0]);
    }

    #[test]
    fn insert_checks_dimension() {
        let mut table = ResidentTable::new(3);
        let err = table.insert("short", vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 3, found: 1 }
        ));
    }
}
