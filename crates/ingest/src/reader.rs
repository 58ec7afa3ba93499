//! Chunked streaming reader over a CSV news corpus.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::config::{ReaderConfig, ReaderMode};
use crate::error::IngestError;
use crate::types::{ArticleRecord, Label, RawText, BINARY_LABELS};

/// Counters maintained while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub chunks: u64,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    id: usize,
    title: usize,
    content: usize,
    kind: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, IngestError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(IngestError::MissingColumn(name))
        };
        Ok(Self {
            id: find("id")?,
            title: find("title")?,
            content: find("content")?,
            kind: find("type")?,
        })
    }
}

/// Streams [`ArticleRecord`]s from a CSV source with `id`, `title`,
/// `content` and `type` columns, in source order.
///
/// Rows are pulled in chunks of `chunk_size` into a bounded buffer so the
/// corpus is never materialized. Rows with an empty `type` are skipped
/// silently; undecodable rows and unparseable ids are logged and skipped.
///
/// An I/O failure of the source ends the stream with a single
/// [`IngestError::Read`] after every row buffered before it.
pub struct CorpusReader<R: Read> {
    csv: csv::Reader<R>,
    columns: Columns,
    config: ReaderConfig,
    buffer: VecDeque<ArticleRecord>,
    exhausted: bool,
    failure: Option<IngestError>,
    stats: ReaderStats,
}

impl CorpusReader<File> {
    /// Open a corpus file. A missing or unreadable file is fatal.
    pub fn open(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), mode = ?config.mode, "opened corpus source");
        Self::from_reader(file, config)
    }
}

impl<R: Read> CorpusReader<R> {
    pub fn from_reader(reader: R, config: ReaderConfig) -> Result<Self, IngestError> {
        if config.chunk_size == 0 {
            return Err(IngestError::InvalidChunkSize);
        }
        let mut csv = ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns = Columns::locate(csv.headers()?)?;
        Ok(Self {
            csv,
            columns,
            buffer: VecDeque::with_capacity(config.chunk_size),
            config,
            exhausted: false,
            failure: None,
            stats: ReaderStats::default(),
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Pull up to `chunk_size` rows from the source into the buffer.
    fn fill_chunk(&mut self) {
        let mut record = StringRecord::new();
        let mut pulled = 0usize;

        while pulled < self.config.chunk_size {
            match self.csv.read_record(&mut record) {
                Ok(true) => {
                    pulled += 1;
                    self.stats.rows_read += 1;
                    match self.convert(&record) {
                        Some(article) => self.buffer.push_back(article),
                        None => self.stats.rows_skipped += 1,
                    }
                }
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(err) if err.is_io_error() => {
                    tracing::error!(error = %err, rows_read = self.stats.rows_read, "corpus source read failed");
                    self.failure = Some(IngestError::Read(err));
                    self.exhausted = true;
                    break;
                }
                Err(err) => {
                    pulled += 1;
                    self.stats.rows_read += 1;
                    self.stats.rows_skipped += 1;
                    tracing::warn!(error = %err, "skipping undecodable corpus row");
                }
            }
        }

        self.stats.chunks += 1;
        tracing::debug!(
            chunk = self.stats.chunks,
            rows = pulled,
            kept = self.buffer.len(),
            "read corpus chunk"
        );
    }

    fn convert(&self, record: &StringRecord) -> Option<ArticleRecord> {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let kind = field(self.columns.kind).trim();
        if kind.is_empty() {
            return None;
        }

        let label = match self.config.mode {
            ReaderMode::Binary => {
                if !BINARY_LABELS.contains(&kind) {
                    return None;
                }
                Label::binary(kind)
            }
            ReaderMode::Multiclass => Label::Class(kind.to_string()),
        };

        let raw_id = field(self.columns.id);
        let Some(id) = parse_id(raw_id) else {
            tracing::warn!(
                id = raw_id,
                line = record.position().map(|p| p.line()),
                "skipping corpus row with unparseable id"
            );
            return None;
        };

        Some(ArticleRecord {
            id,
            text: RawText::from_fields(
                field(self.columns.title),
                field(self.columns.content),
                self.config.separate,
            ),
            label,
        })
    }
}

impl<R: Read> Iterator for CorpusReader<R> {
    type Item = Result<ArticleRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.exhausted {
            self.fill_chunk();
        }
        match self.buffer.pop_front() {
            Some(article) => Some(Ok(article)),
            None => self.failure.take().map(Err),
        }
    }
}

/// Ids are integers, though some exports render them as `123.0`.
fn parse_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Serves `data` and then fails instead of reporting end of input.
    struct FailingAfter {
        data: io::Cursor<Vec<u8>>,
    }

    impl Read for FailingAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("disk went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn source_failure_ends_the_stream_with_an_error() {
        let mut body = String::from("id,title,content,type\n");
        for id in 0..50 {
            body.push_str(&format!("{id},Title,body text,fake\n"));
        }
        let source = FailingAfter {
            data: io::Cursor::new(body.into_bytes()),
        };
        let cfg = ReaderConfig::new(ReaderMode::Multiclass).with_chunk_size(8);
        let mut reader = CorpusReader::from_reader(source, cfg).unwrap();

        let items: Vec<_> = reader.by_ref().collect();
        assert_eq!(items.len(), 51);
        assert!(items[..50].iter().all(Result::is_ok));
        assert!(matches!(items[50], Err(IngestError::Read(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn parse_id_accepts_float_rendering() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id(" 42.0 "), Some(42));
        assert_eq!(parse_id("42.5"), None);
        assert_eq!(parse_id("abc"), None);
    }
}
