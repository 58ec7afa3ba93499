//! Train/test/validation partitioning of a shuffled corpus.
//!
//! Two streaming passes: the first counts lines, the second routes line `i`
//! to train while `i < train`, to test while `i < train + test`, and to
//! validation otherwise. The splitter adds no randomness of its own; an
//! unbiased partition depends on the input already being shuffled.
//!
//! All three outputs are written to temporary siblings and renamed into
//! place once the second pass completes. Existence of all three final paths
//! therefore marks a finished split.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::atomic::AtomicFile;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("corpus file {0} does not exist")]
    InputMissing(PathBuf),

    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SplitError {
    pub(crate) fn io(path: &Path) -> impl Fn(io::Error) -> SplitError + '_ {
        move |source| SplitError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Line counts of the three partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: u64,
    pub test: u64,
    pub val: u64,
}

impl SplitSizes {
    /// 80/10/10 by floor; validation takes the remainder.
    ///
    /// ```rust
    /// use newsprep::SplitSizes;
    ///
    /// let sizes = SplitSizes::from_total(103);
    /// assert_eq!((sizes.train, sizes.test, sizes.val), (82, 10, 11));
    /// ```
    pub fn from_total(total: u64) -> Self {
        let train = total * 8 / 10;
        let test = total / 10;
        Self {
            train,
            test,
            val: total - train - test,
        }
    }

    pub fn total(&self) -> u64 {
        self.train + self.test + self.val
    }
}

/// Destinations of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPaths {
    pub train: PathBuf,
    pub test: PathBuf,
    pub val: PathBuf,
}

impl SplitPaths {
    pub fn is_complete(&self) -> bool {
        self.train.exists() && self.test.exists() && self.val.exists()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    Written(SplitSizes),
    AlreadyComplete,
}

/// Count newline-terminated lines; a final unterminated line counts too.
pub fn count_lines(path: impl AsRef<Path>) -> Result<u64, SplitError> {
    let path = path.as_ref();
    let mut reader = open_input(path)?;
    let mut buf = Vec::new();
    let mut count = 0u64;
    while reader.read_until(b'\n', &mut buf).map_err(SplitError::io(path))? > 0 {
        count += 1;
        buf.clear();
    }
    Ok(count)
}

/// Partition `input` into the three files of `paths`. Skipped entirely when
/// all three already exist.
pub fn split_corpus(input: impl AsRef<Path>, paths: &SplitPaths) -> Result<SplitOutcome, SplitError> {
    let input = input.as_ref();
    if paths.is_complete() {
        tracing::info!(input = %input.display(), "split already complete, skipping");
        return Ok(SplitOutcome::AlreadyComplete);
    }

    let total = count_lines(input)?;
    let sizes = SplitSizes::from_total(total);
    tracing::info!(
        input = %input.display(),
        total,
        train = sizes.train,
        test = sizes.test,
        val = sizes.val,
        "splitting corpus"
    );

    let mut train = AtomicFile::create(&paths.train).map_err(SplitError::io(&paths.train))?;
    let mut test = AtomicFile::create(&paths.test).map_err(SplitError::io(&paths.test))?;
    let mut val = AtomicFile::create(&paths.val).map_err(SplitError::io(&paths.val))?;

    let mut reader = open_input(input)?;
    let mut line = Vec::new();
    let mut index = 0u64;
    while reader.read_until(b'\n', &mut line).map_err(SplitError::io(input))? > 0 {
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        let out = if index < sizes.train {
            &mut train
        } else if index < sizes.train + sizes.test {
            &mut test
        } else {
            &mut val
        };
        out.write_all(&line)
            .map_err(|source| SplitError::Io {
                path: out.final_path().to_path_buf(),
                source,
            })?;
        line.clear();
        index += 1;
    }

    for file in [train, test, val] {
        let target = file.final_path().to_path_buf();
        file.commit().map_err(SplitError::io(&target))?;
    }

    Ok(SplitOutcome::Written(sizes))
}

fn open_input(path: &Path) -> Result<BufReader<File>, SplitError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(SplitError::InputMissing(path.to_path_buf())),
        Err(source) => Err(SplitError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(dir: &Path) -> SplitPaths {
        SplitPaths {
            train: dir.join("c.train.jsonl"),
            test: dir.join("c.test.jsonl"),
            val: dir.join("c.val.jsonl"),
        }
    }

    #[test]
    fn sizes_always_add_up() {
        for total in [0u64, 1, 7, 9, 10, 11, 99, 100, 103, 1_000_003] {
            let sizes = SplitSizes::from_total(total);
            assert_eq!(sizes.total(), total);
            assert_eq!(sizes.train, (total as f64 * 0.8).floor() as u64);
            assert_eq!(sizes.test, (total as f64 * 0.1).floor() as u64);
        }
    }

    #[test]
    fn lines_are_routed_by_position() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("c.shuffled.jsonl");
        let body: String = (0..20).map(|i| format!("{{\"id\":{i}}}\n")).collect();
        fs::write(&input, body).unwrap();

        let out = paths(dir.path());
        let outcome = split_corpus(&input, &out).unwrap();
        assert_eq!(
            outcome,
            SplitOutcome::Written(SplitSizes {
                train: 16,
                test: 2,
                val: 2
            })
        );

        let test = fs::read_to_string(&out.test).unwrap();
        assert_eq!(test, "{\"id\":16}\n{\"id\":17}\n");
        assert_eq!(fs::read_to_string(&out.val).unwrap().lines().count(), 2);
    }

    #[test]
    fn unterminated_last_line_is_counted_and_terminated() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("c.shuffled.jsonl");
        fs::write(&input, "a\nb\nc").unwrap();
        assert_eq!(count_lines(&input).unwrap(), 3);

        let out = paths(dir.path());
        split_corpus(&input, &out).unwrap();
        assert_eq!(fs::read_to_string(&out.train).unwrap(), "a\nb\n");
        assert_eq!(fs::read_to_string(&out.test).unwrap(), "");
        assert_eq!(fs::read_to_string(&out.val).unwrap(), "c\n");
    }

    #[test]
    fn existing_outputs_skip_the_split() {
        let dir = TempDir::new().unwrap();
        let out = paths(dir.path());
        for path in [&out.train, &out.test, &out.val] {
            fs::write(path, "").unwrap();
        }
        let outcome = split_corpus(dir.path().join("absent.jsonl"), &out).unwrap();
        assert_eq!(outcome, SplitOutcome::AlreadyComplete);
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = split_corpus(dir.path().join("absent.jsonl"), &paths(dir.path())).unwrap_err();
        assert!(matches!(err, SplitError::InputMissing(_)));
        assert!(!paths(dir.path()).train.exists());
    }
}
