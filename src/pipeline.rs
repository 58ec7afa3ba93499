//! End-to-end preparation of one dataset flavor.
//!
//! ```text
//! <stem>.csv ─► preprocess ─► .preprocessed.jsonl
//!                                   │ shuffle (seeded)
//!                                   ▼
//!                       .preprocessed.shuffled.jsonl ─► split ─► .train / .test / .val
//! ```
//!
//! Every stage is skipped when its output already exists, so an interrupted
//! run resumes at the first missing file. Outputs are only ever renamed into
//! place complete.

use std::path::Path;

use embedding::{BackedStore, EmbeddingError, EmbeddingResolver, ResidentTable};
use ingest::CorpusReader;

use crate::PipelineError;
use crate::config::{DatasetFlavor, DatasetPaths, PrepConfig};
use crate::preprocess::{PreprocessStats, Preprocessor, write_preprocessed};
use crate::shuffle::shuffle_lines;
use crate::split::{SplitOutcome, split_corpus};

/// What a [`prepare`] call did. `None` marks a stage skipped because its
/// output was already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    pub flavor: DatasetFlavor,
    pub paths: DatasetPaths,
    pub preprocess: Option<PreprocessStats>,
    pub shuffled_lines: Option<u64>,
    pub split: SplitOutcome,
}

/// Produce the train/test/validation files of `flavor`.
pub fn prepare(config: &PrepConfig, flavor: DatasetFlavor) -> Result<PrepareReport, PipelineError> {
    let paths = config.paths(flavor);
    tracing::info!(flavor = %flavor, data_dir = %config.data_dir.display(), "preparing dataset");

    let preprocess = if paths.preprocessed.exists() {
        skipped("preprocess", &paths.preprocessed);
        None
    } else {
        Some(run_preprocess(config, flavor, &paths.preprocessed)?)
    };

    let shuffled_lines = if paths.shuffled.exists() {
        skipped("shuffle", &paths.shuffled);
        None
    } else {
        let lines = shuffle_lines(&paths.preprocessed, &paths.shuffled, config.shuffle_seed)?;
        tracing::info!(path = %paths.shuffled.display(), lines, seed = config.shuffle_seed, "shuffled corpus");
        Some(lines)
    };

    let split = split_corpus(&paths.shuffled, &paths.split)?;

    Ok(PrepareReport {
        flavor,
        paths,
        preprocess,
        shuffled_lines,
        split,
    })
}

fn run_preprocess(config: &PrepConfig, flavor: DatasetFlavor, output: &Path) -> Result<PreprocessStats, PipelineError> {
    let reader = CorpusReader::open(config.corpus_path(), config.reader_config(flavor))?;
    let preprocessor = Preprocessor::new(config.normalize.clone(), config.pool_config())?;
    let stream = preprocessor.run(reader, flavor.preprocess_options())?;
    Ok(write_preprocessed(stream, output)?)
}

/// Open the redb embedding store, converting the word-vector text file
/// into it first when the store does not exist yet.
pub fn build_embedding_store(config: &PrepConfig) -> Result<BackedStore, PipelineError> {
    let store_path = config.store_path();
    if store_path.exists() {
        skipped("embedding store", &store_path);
        return Ok(BackedStore::open(&store_path)?);
    }

    let table = ResidentTable::load_vec_file(config.vectors_path())?;
    if table.dim() != config.embedding.dim {
        return Err(EmbeddingError::DimensionMismatch {
            expected: config.embedding.dim,
            found: table.dim(),
        }
        .into());
    }

    let entries = table.iter().map(|(token, vector)| (token, vector.to_vec()));
    Ok(BackedStore::build(&store_path, table.dim(), entries)?)
}

fn skipped(stage: &str, output: &Path) {
    tracing::info!(stage, path = %output.display(), "output exists, skipping stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(dir: &Path) -> PrepConfig {
        let mut config = PrepConfig {
            data_dir: dir.to_path_buf(),
            corpus_stem: "news".to_string(),
            ..PrepConfig::default()
        };
        config.pool.workers = Some(2);
        config.pool.chunk_size = 2;
        config.embedding.dim = 2;
        config
    }

    #[test]
    fn existing_outputs_skip_stages() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let paths = config.paths(DatasetFlavor::Binary);
        fs::write(&paths.preprocessed, "").unwrap();
        fs::write(&paths.shuffled, "{\"id\":1,\"content\":[],\"label\":0}\n").unwrap();

        let report = prepare(&config, DatasetFlavor::Binary).unwrap();
        assert!(report.preprocess.is_none());
        assert!(report.shuffled_lines.is_none());
        assert!(matches!(report.split, SplitOutcome::Written(sizes) if sizes.total() == 1));
    }

    #[test]
    fn missing_corpus_is_an_ingest_error() {
        let dir = TempDir::new().unwrap();
        let err = prepare(&config(dir.path()), DatasetFlavor::Multiclass).unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(_)));
    }

    #[test]
    fn store_is_built_once_from_vectors() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.embedding.vectors_path = Some(PathBuf::from("vectors.vec"));
        fs::write(dir.path().join("vectors.vec"), "2 2\nsenat 1 2\nvote 3 4\n").unwrap();

        let store = build_embedding_store(&config).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        drop(store);

        fs::remove_file(dir.path().join("vectors.vec")).unwrap();
        let reopened = build_embedding_store(&config).unwrap();
        assert_eq!(reopened.dim(), 2);
    }

    #[test]
    fn vector_dimension_must_match_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.embedding.dim = 3;
        fs::write(config.vectors_path(), "1 2\nsenat 1 2\n").unwrap();

        let err = build_embedding_store(&config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Embedding(EmbeddingError::DimensionMismatch { expected: 3, found: 2 })
        ));
    }
}
