use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::errors::{ScanError, ScanResult};
use crate::query::{Document, QuerySet};
use crate::results::ScoreTable;

// Files at or above this size are memory-mapped instead of read into a buffer
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// How a file's bytes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    InMemory,
    Mmap,
}

/// Everything one worker learned about one file
#[derive(Debug)]
pub struct FileReport {
    /// File identifier (path relative to the scan root)
    pub path: PathBuf,
    pub outcome: ScanResult<ScoreTable>,
    pub bytes: u64,
    pub strategy: Option<ReadStrategy>,
    pub queries_evaluated: u64,
    pub memo_hits: u64,
    pub memo_misses: u64,
    pub elapsed: Duration,
}

impl FileReport {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            outcome: Ok(ScoreTable::new()),
            bytes: 0,
            strategy: None,
            queries_evaluated: 0,
            memo_hits: 0,
            memo_misses: 0,
            elapsed: Duration::ZERO,
        }
    }
}

enum FileBytes {
    Buffer(Vec<u8>),
    Mapped(Mmap),
}

impl FileBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            FileBytes::Buffer(bytes) => bytes.as_slice(),
            FileBytes::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Decodes bytes according to the encoding mode, borrowing when possible
fn decode_bytes<'b>(
    bytes: &'b [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> ScanResult<Cow<'b, str>> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| ScanError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let text = String::from_utf8_lossy(bytes);
            if let Cow::Owned(_) = text {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(text)
        }
    }
}

/// Scores one file against the full query batch.
///
/// A worker holds only shared references to the compiled queries; the text,
/// the term memo and the resulting table all belong to the call.
#[derive(Debug, Clone)]
pub struct FileWorker<'q> {
    queries: &'q QuerySet,
    encoding_mode: EncodingMode,
    timeout: Option<Duration>,
}

impl<'q> FileWorker<'q> {
    pub fn new(queries: &'q QuerySet, encoding_mode: EncodingMode) -> Self {
        Self {
            queries,
            encoding_mode,
            timeout: None,
        }
    }

    /// Bounds the time spent on a single file; checked between queries
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Processes a file, using its path as the identifier
    pub fn process(&self, path: &Path) -> FileReport {
        self.process_as(path, path.to_path_buf())
    }

    /// Processes a file, reporting it under the given identifier.
    ///
    /// Read and decode failures are logged and returned in the report rather
    /// than propagated, so a bad file never takes down the scan.
    pub fn process_as(&self, path: &Path, id: PathBuf) -> FileReport {
        trace!("Processing file: {}", path.display());
        let started = Instant::now();
        let mut report = FileReport::new(id);

        let outcome = self
            .read(path, &mut report)
            .and_then(|bytes| {
                let text = decode_bytes(bytes.as_slice(), path, self.encoding_mode)?;
                self.score(&text, path, started, &mut report)
            });

        if let Err(e) = &outcome {
            warn!("Skipping {}: {}", path.display(), e);
        }
        report.outcome = outcome;
        report.elapsed = started.elapsed();
        report
    }

    /// Scores already-loaded text with no time budget
    pub fn score_text(&self, text: &str) -> ScoreTable {
        let mut doc = Document::new(text);
        let mut table = ScoreTable::with_capacity(self.queries.len());
        for query in self.queries.iter() {
            table.push(query.shared_text(), query.expr().score(&mut doc));
        }
        table
    }

    fn read(&self, path: &Path, report: &mut FileReport) -> ScanResult<FileBytes> {
        let file = File::open(path).map_err(|e| ScanError::file_read(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| ScanError::file_read(path, e))?
            .len();

        let bytes = if size >= LARGE_FILE_THRESHOLD {
            report.strategy = Some(ReadStrategy::Mmap);
            // SAFETY: the map is only read; corpus files must not be truncated mid-scan
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::file_read(path, e))?;
            FileBytes::Mapped(mmap)
        } else {
            report.strategy = Some(ReadStrategy::InMemory);
            FileBytes::Buffer(std::fs::read(path).map_err(|e| ScanError::file_read(path, e))?)
        };

        report.bytes = bytes.as_slice().len() as u64;
        Ok(bytes)
    }

    fn score(
        &self,
        text: &str,
        path: &Path,
        started: Instant,
        report: &mut FileReport,
    ) -> ScanResult<ScoreTable> {
        let mut doc = Document::new(text);
        let mut table = ScoreTable::with_capacity(self.queries.len());

        for query in self.queries.iter() {
            if let Some(budget) = self.timeout {
                if started.elapsed() >= budget {
                    return Err(ScanError::timeout(path, budget));
                }
            }
            table.push(query.shared_text(), query.expr().score(&mut doc));
            report.queries_evaluated += 1;
        }

        let (hits, misses) = doc.memo_stats();
        report.memo_hits = hits;
        report.memo_misses = misses;
        Ok(table)
    }
}
