//! Temp-then-rename file writer.
//!
//! Every corpus file is written to a temporary sibling and renamed onto its
//! final path only when the writer is committed, so a final path exists only
//! for a stage that ran to completion. Dropping an uncommitted writer removes
//! the temporary file.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub(crate) struct AtomicFile {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
}

impl AtomicFile {
    /// Create the temporary file next to `final_path`. Missing parent
    /// directories are created.
    pub(crate) fn create(final_path: impl AsRef<Path>) -> io::Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let parent = match final_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let temp = NamedTempFile::new_in(&parent)?;
        Ok(Self {
            writer: BufWriter::new(temp),
            final_path,
        })
    }

    pub(crate) fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, sync and rename onto the final path.
    pub(crate) fn commit(self) -> io::Result<PathBuf> {
        let temp = self.writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.final_path).map_err(|e| e.error)?;
        Ok(self.final_path)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
