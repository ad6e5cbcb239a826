/// Parallel corpus scanning.
///
/// A scan runs in three stages:
///
/// 1. **Enumeration**: the [`CorpusScanner`] walks the root directory with
///    `ignore::WalkBuilder`, keeps the files accepted by the predicate and sorts
///    them by relative path so every run sees the same order.
/// 2. **Scoring**: files are handed to a dedicated rayon pool of
///    `min(max_workers, cores)` threads. Each file is processed by a
///    [`FileWorker`], which owns the file's text, its term memo and its
///    [`ScoreTable`](crate::results::ScoreTable). Workers share only the
///    read-only compiled queries.
/// 3. **Aggregation**: the coordinating thread folds the collected reports into
///    [`CorpusStatistics`](crate::results::CorpusStatistics) and
///    [`ScanMetrics`](crate::metrics::ScanMetrics) one at a time.
///
/// Failures stay local. An unreadable or undecodable file, or one that runs
/// past its time budget, is logged and reported as failed; the other files are
/// unaffected. Only a root directory that cannot be enumerated aborts the scan.
///
/// ```rust,ignore
/// let config = ScanConfig::new("corpus", ["GSTP1 AND Breast cancer AND PCR"]);
/// let output = termscout::scan::run(&config)?;
/// for (query, files) in output.statistics.presence_counts() {
///     println!("{query}: {files}");
/// }
/// ```
pub mod engine;
pub mod processor;

pub use engine::{run, scan, CorpusScanner, ScanOutput};
pub use processor::{FileReport, FileWorker, ReadStrategy};
