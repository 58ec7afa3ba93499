//! YAML configuration for the preparation pipeline.
//!
//! One [`PrepConfig`] is built at process start, from a file or from
//! defaults, and passed by reference to every stage. Every section is
//! optional in the file.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! data_dir: "data/fake_news_corpus"
//! corpus_stem: "news_cleaned_2018_02_13"
//!
//! normalize:
//!   version: 1
//!   stem: true
//!   remove_stopwords: true
//!   min_token_len: 3
//!
//! reader:
//!   chunk_size: 10000
//!
//! pool:
//!   workers: 8
//!   chunk_size: 1000
//!   recycle_after: 1
//!
//! shuffle_seed: 42
//!
//! embedding:
//!   dim: 100
//!
//! batch:
//!   batch_size: 64
//!   max_words_content: 300
//!   max_words_title: 50
//! ```
//!
//! `NEWSPREP_DATA_DIR`, when set, replaces `data_dir`.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use canonical::NormalizeConfig;
use ingest::{ReaderConfig, ReaderMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::{PoolConfig, default_workers};
use crate::preprocess::PreprocessOptions;
use crate::split::SplitPaths;

/// Environment variable overriding [`PrepConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "NEWSPREP_DATA_DIR";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration of a preparation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PrepConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Directory holding the corpus and every derived file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File stem of the corpus; the CSV is `<data_dir>/<corpus_stem>.csv`.
    #[serde(default = "default_corpus_stem")]
    pub corpus_stem: String,

    #[serde(default)]
    pub normalize: NormalizeConfig,

    #[serde(default)]
    pub reader: ReaderSection,

    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default = "default_shuffle_seed")]
    pub shuffle_seed: u64,

    #[serde(default)]
    pub embedding: EmbeddingSection,

    #[serde(default)]
    pub batch: BatchSection,
}

impl PrepConfig {
    /// Load from `path`, or start from defaults when `path` is `None`, then
    /// apply the environment override and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PrepConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
            tracing::debug!(data_dir = %dir, "data directory overridden from environment");
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if self.corpus_stem.is_empty() {
            return Err(ConfigLoadError::Validation("corpus_stem must not be empty".to_string()));
        }
        self.normalize
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("normalize: {err}")))?;
        if self.reader.chunk_size == 0 {
            return Err(ConfigLoadError::Validation("reader.chunk_size must be >= 1".to_string()));
        }
        self.pool_config()
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("pool: {err}")))?;
        self.embedding.validate()?;
        self.batch.validate()?;
        Ok(())
    }

    /// Worker pool used by the preprocessor.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_workers(self.pool.workers.unwrap_or_else(default_workers))
            .with_chunk_size(self.pool.chunk_size)
            .with_queue_depth(self.pool.queue_depth)
            .with_recycle_after(self.pool.recycle_after)
    }

    pub fn reader_config(&self, flavor: DatasetFlavor) -> ReaderConfig {
        ReaderConfig::new(flavor.reader_mode())
            .with_separate(flavor.is_separate())
            .with_chunk_size(self.reader.chunk_size)
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.csv", self.corpus_stem))
    }

    /// Word-vector text file. Relative paths are taken from `data_dir`.
    pub fn vectors_path(&self) -> PathBuf {
        match &self.embedding.vectors_path {
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(format!("{}.fasttext.vec", self.corpus_stem)),
        }
    }

    /// redb embedding store. Relative paths are taken from `data_dir`.
    pub fn store_path(&self) -> PathBuf {
        match &self.embedding.store_path {
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(format!("{}.fasttext.redb", self.corpus_stem)),
        }
    }

    /// Every file derived from the corpus for `flavor`.
    pub fn paths(&self, flavor: DatasetFlavor) -> DatasetPaths {
        let base = format!("{}{}", self.corpus_stem, flavor.suffix());
        let file = |name: &str| self.data_dir.join(format!("{base}.{name}.jsonl"));
        DatasetPaths {
            preprocessed: file("preprocessed"),
            shuffled: file("preprocessed.shuffled"),
            split: SplitPaths {
                train: file("preprocessed.shuffled.train"),
                test: file("preprocessed.shuffled.test"),
                val: file("preprocessed.shuffled.val"),
            },
        }
    }
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            corpus_stem: default_corpus_stem(),
            normalize: NormalizeConfig::default(),
            reader: ReaderSection::default(),
            pool: PoolSection::default(),
            shuffle_seed: default_shuffle_seed(),
            embedding: EmbeddingSection::default(),
            batch: BatchSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSection {
    #[serde(default = "default_reader_chunk")]
    pub chunk_size: usize,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            chunk_size: default_reader_chunk(),
        }
    }
}

/// Preprocessing pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSection {
    /// `None` uses the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default = "default_pool_chunk")]
    pub chunk_size: usize,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Rebuild worker state after this many chunks; `null` never does.
    #[serde(default = "default_recycle_after")]
    pub recycle_after: Option<usize>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: default_pool_chunk(),
            queue_depth: default_queue_depth(),
            recycle_after: default_recycle_after(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSection {
    #[serde(default)]
    pub vectors_path: Option<PathBuf>,

    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_dim")]
    pub dim: usize,
}

impl EmbeddingSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.dim == 0 {
            return Err(ConfigLoadError::Validation("embedding.dim must be >= 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            vectors_path: None,
            store_path: None,
            dim: default_dim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_words_content")]
    pub max_words_content: usize,

    #[serde(default = "default_max_words_title")]
    pub max_words_title: usize,

    /// Lines per worker chunk in [`BackedBatches`](crate::BackedBatches).
    #[serde(default = "default_backed_chunk")]
    pub backed_chunk_size: usize,
}

impl BatchSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let fields = [
            ("batch.batch_size", self.batch_size),
            ("batch.max_words_content", self.max_words_content),
            ("batch.max_words_title", self.max_words_title),
            ("batch.backed_chunk_size", self.backed_chunk_size),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigLoadError::Validation(format!("{name} must be >= 1")));
            }
        }
        Ok(())
    }
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_words_content: default_max_words_content(),
            max_words_title: default_max_words_title(),
            backed_chunk_size: default_backed_chunk(),
        }
    }
}

/// Which labelled dataset a run prepares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetFlavor {
    /// Four binary classes reduced to 0/1, duplicates kept.
    Binary,
    /// Every class as its name, deduplicated.
    Multiclass,
    /// As `Multiclass`, with title and content normalized separately.
    #[default]
    MulticlassSeparate,
}

impl DatasetFlavor {
    pub fn name(self) -> &'static str {
        match self {
            DatasetFlavor::Binary => "binary",
            DatasetFlavor::Multiclass => "all",
            DatasetFlavor::MulticlassSeparate => "all-separate",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DatasetFlavor::Binary => "",
            DatasetFlavor::Multiclass => "_all",
            DatasetFlavor::MulticlassSeparate => "_all_separate",
        }
    }

    pub fn reader_mode(self) -> ReaderMode {
        match self {
            DatasetFlavor::Binary => ReaderMode::Binary,
            DatasetFlavor::Multiclass | DatasetFlavor::MulticlassSeparate => ReaderMode::Multiclass,
        }
    }

    pub fn is_separate(self) -> bool {
        matches!(self, DatasetFlavor::MulticlassSeparate)
    }

    pub fn preprocess_options(self) -> PreprocessOptions {
        PreprocessOptions::new(matches!(self, DatasetFlavor::Binary), self.is_separate())
    }
}

impl std::fmt::Display for DatasetFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetFlavor {
    type Err = ConfigLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(DatasetFlavor::Binary),
            "all" => Ok(DatasetFlavor::Multiclass),
            "all-separate" => Ok(DatasetFlavor::MulticlassSeparate),
            other => Err(ConfigLoadError::Validation(format!(
                "unknown dataset flavor `{other}` (expected binary, all or all-separate)"
            ))),
        }
    }
}

/// Files derived from the corpus for one flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub preprocessed: PathBuf,
    pub shuffled: PathBuf,
    pub split: SplitPaths,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/fake_news_corpus")
}

fn default_corpus_stem() -> String {
    "news_cleaned_2018_02_13".to_string()
}

fn default_shuffle_seed() -> u64 {
    42
}

fn default_reader_chunk() -> usize {
    10_000
}

fn default_pool_chunk() -> usize {
    1000
}

fn default_queue_depth() -> usize {
    4
}

fn default_recycle_after() -> Option<usize> {
    Some(1)
}

fn default_dim() -> usize {
    embedding::EMBEDDING_DIM
}

fn default_batch_size() -> usize {
    64
}

fn default_max_words_content() -> usize {
    300
}

fn default_max_words_title() -> usize {
    50
}

fn default_backed_chunk() -> usize {
    crate::batch::DEFAULT_BACKED_CHUNK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PrepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pool.recycle_after, Some(1));
        assert_eq!(config.pool.chunk_size, 1000);
        assert_eq!(config.embedding.dim, 100);
        assert_eq!(config.batch.backed_chunk_size, 10);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
version: "1.0"
data_dir: "/srv/corpus"
pool:
  workers: 3
  recycle_after: null
batch:
  batch_size: 16
"#;
        let config = PrepConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/corpus"));
        assert_eq!(config.pool.workers, Some(3));
        assert_eq!(config.pool.recycle_after, None);
        assert_eq!(config.pool.chunk_size, 1000);
        assert_eq!(config.batch.batch_size, 16);
        assert_eq!(config.batch.max_words_content, 300);
        assert_eq!(config.pool_config().workers, 3);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = PrepConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = PrepConfig::from_yaml("batch:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Validation(msg) if msg.contains("batch.batch_size")));

        let err = PrepConfig::from_yaml("pool:\n  chunk_size: 0\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Validation(_)));
    }

    #[test]
    fn env_override_replaces_data_dir() {
        let config = PrepConfig::default().with_env_overrides(|key| {
            (key == DATA_DIR_ENV).then(|| "/mnt/news".to_string())
        });
        assert_eq!(config.data_dir, PathBuf::from("/mnt/news"));

        let untouched = PrepConfig::default().with_env_overrides(|_| Some(String::new()));
        assert_eq!(untouched.data_dir, default_data_dir());
    }

    #[test]
    fn flavor_paths_follow_stems() {
        let config = PrepConfig {
            data_dir: PathBuf::from("/d"),
            corpus_stem: "news".to_string(),
            ..PrepConfig::default()
        };

        assert_eq!(config.corpus_path(), PathBuf::from("/d/news.csv"));
        let binary = config.paths(DatasetFlavor::Binary);
        assert_eq!(binary.preprocessed, PathBuf::from("/d/news.preprocessed.jsonl"));
        assert_eq!(binary.split.train, PathBuf::from("/d/news.preprocessed.shuffled.train.jsonl"));

        let all = config.paths(DatasetFlavor::Multiclass);
        assert_eq!(all.shuffled, PathBuf::from("/d/news_all.preprocessed.shuffled.jsonl"));

        let separate = config.paths(DatasetFlavor::MulticlassSeparate);
        assert_eq!(separate.split.val, PathBuf::from("/d/news_all_separate.preprocessed.shuffled.val.jsonl"));
        assert_eq!(config.store_path(), PathBuf::from("/d/news.fasttext.redb"));
    }

    #[test]
    fn flavor_names_parse() {
        for flavor in [DatasetFlavor::Binary, DatasetFlavor::Multiclass, DatasetFlavor::MulticlassSeparate] {
            assert_eq!(flavor.name().parse::<DatasetFlavor>().unwrap(), flavor);
        }
        assert!("everything".parse::<DatasetFlavor>().is_err());
        assert_eq!(DatasetFlavor::default(), DatasetFlavor::MulticlassSeparate);
    }

    #[test]
    fn flavor_options() {
        let binary = DatasetFlavor::Binary.preprocess_options();
        assert!(binary.duplicates_allowed);
        assert!(!binary.separate);

        let separate = DatasetFlavor::MulticlassSeparate.preprocess_options();
        assert!(!separate.duplicates_allowed);
        assert!(separate.separate);

        let config = PrepConfig::default();
        assert_eq!(config.reader_config(DatasetFlavor::Binary).mode, ReaderMode::Binary);
        assert!(config.reader_config(DatasetFlavor::MulticlassSeparate).separate);
    }
}
