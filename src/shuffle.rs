//! Seeded line shuffle.
//!
//! The split step partitions by line position, so the quality of the split
//! is the quality of this shuffle. A fixed seed makes the whole preparation
//! reproducible byte for byte.

use std::fs;
use std::io::Write;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::atomic::AtomicFile;
use crate::split::SplitError;

/// Shuffle the lines of `input` into `output` and return the line count.
///
/// The corpus is held in memory for the duration of the shuffle.
pub fn shuffle_lines(input: impl AsRef<Path>, output: impl AsRef<Path>, seed: u64) -> Result<u64, SplitError> {
    let input = input.as_ref();
    let output = output.as_ref();

    let data = match fs::read(input) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SplitError::InputMissing(input.to_path_buf()));
        }
        Err(err) => return Err(SplitError::io(input)(err)),
    };

    let mut lines: Vec<&[u8]> = data.split(|b| *b == b'\n').collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    lines.shuffle(&mut rng);

    let mut out = AtomicFile::create(output).map_err(SplitError::io(output))?;
    for line in &lines {
        out.write_all(line).map_err(SplitError::io(output))?;
        out.write_all(b"\n").map_err(SplitError::io(output))?;
    }
    out.commit().map_err(SplitError::io(output))?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        lines = lines.len(),
        seed,
        "shuffled corpus"
    );
    Ok(lines.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corpus(dir: &Path, n: usize) -> std::path::PathBuf {
        let path = dir.join("in.jsonl");
        let body: String = (0..n).map(|i| format!("line-{i}\n")).collect();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn same_seed_same_order() {
        let dir = TempDir::new().unwrap();
        let input = corpus(dir.path(), 50);

        shuffle_lines(&input, dir.path().join("a.jsonl"), 7).unwrap();
        shuffle_lines(&input, dir.path().join("b.jsonl"), 7).unwrap();

        let a = fs::read(dir.path().join("a.jsonl")).unwrap();
        let b = fs::read(dir.path().join("b.jsonl")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let dir = TempDir::new().unwrap();
        let input = corpus(dir.path(), 50);
        let output = dir.path().join("out.jsonl");

        assert_eq!(shuffle_lines(&input, &output, 1).unwrap(), 50);

        let original = fs::read_to_string(&input).unwrap();
        let shuffled = fs::read_to_string(&output).unwrap();
        assert_ne!(original, shuffled);

        let mut a: Vec<&str> = original.lines().collect();
        let mut b: Vec<&str> = shuffled.lines().collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = shuffle_lines(dir.path().join("absent"), dir.path().join("out"), 1).unwrap_err();
        assert!(matches!(err, SplitError::InputMissing(_)));
    }
}
