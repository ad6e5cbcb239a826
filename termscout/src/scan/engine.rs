use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::processor::{FileReport, FileWorker};
use crate::config::{EncodingMode, ScanConfig};
use crate::errors::{ScanError, ScanResult};
use crate::filters::FileSelector;
use crate::metrics::ScanMetrics;
use crate::query::QuerySet;
use crate::results::{CorpusStatistics, FailedFile, FileScores, ResultAggregator};

/// Walks a corpus and scores its files on a bounded worker pool
#[derive(Debug, Clone)]
pub struct CorpusScanner {
    workers: usize,
    encoding_mode: EncodingMode,
    timeout: Option<Duration>,
    show_progress: bool,
}

impl CorpusScanner {
    /// Creates a scanner with `min(max_workers, cores)` workers
    pub fn new(max_workers: usize) -> Self {
        Self {
            workers: max_workers.min(num_cpus::get()).max(1),
            encoding_mode: EncodingMode::default(),
            timeout: None,
            show_progress: false,
        }
    }

    pub fn from_config(config: &ScanConfig) -> ScanResult<Self> {
        Ok(Self::new(config.worker_count())
            .with_encoding(config.encoding_mode)
            .with_timeout(config.file_timeout()?)
            .with_progress(config.show_progress))
    }

    pub fn with_encoding(mut self, encoding_mode: EncodingMode) -> Self {
        self.encoding_mode = encoding_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Lists the corpus files under `root`, sorted by relative path.
    ///
    /// The predicate sees each path relative to `root` and is the only
    /// selector: dotfiles and symlinked files are walked like any other.
    /// Entries that cannot be read (including symlink loops) are logged and
    /// skipped; only an unreadable root is an error.
    pub fn collect_files<F>(&self, root: &Path, predicate: F) -> ScanResult<Vec<(PathBuf, PathBuf)>>
    where
        F: Fn(&Path) -> bool,
    {
        check_root(root)?;

        let mut walker = WalkBuilder::new(root);
        walker
            .hidden(false)
            .follow_links(true)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false);

        let mut files: Vec<(PathBuf, PathBuf)> = walker
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let path = entry.into_path();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                predicate(&relative).then_some((path, relative))
            })
            .collect();

        files.sort_by(|a, b| a.1.cmp(&b.1));
        debug!("Found {} files to process under {}", files.len(), root.display());
        Ok(files)
    }

    /// Scores every selected file under `root` against `queries`.
    ///
    /// Reports come back in enumeration order whatever the pool size.
    pub fn scan<F>(&self, root: &Path, predicate: F, queries: &QuerySet) -> ScanResult<Vec<FileReport>>
    where
        F: Fn(&Path) -> bool,
    {
        let files = self.collect_files(root, predicate)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("termscout-worker-{}", i))
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?;
        debug!("Scanning with {} workers", self.workers);

        let progress = if self.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let worker = FileWorker::new(queries, self.encoding_mode).with_timeout(self.timeout);
        let reports: Vec<FileReport> = pool.install(|| {
            files
                .par_iter()
                .map(|(path, relative)| {
                    let report = worker.process_as(path, relative.clone());
                    progress.inc(1);
                    report
                })
                .collect()
        });
        progress.finish_and_clear();

        Ok(reports)
    }
}

/// Fails unless `root` is a readable directory
fn check_root(root: &Path) -> ScanResult<()> {
    if !root.is_dir() {
        let reason = if root.exists() {
            "not a directory"
        } else {
            "no such directory"
        };
        return Err(ScanError::enumeration(root, reason));
    }
    std::fs::read_dir(root).map_err(|e| ScanError::enumeration(root, e.to_string()))?;
    Ok(())
}

/// Scores the corpus under `root` and returns the tables of the files that
/// could be read, in enumeration order
pub fn scan<F>(
    root: &Path,
    predicate: F,
    queries: &QuerySet,
    parallelism: usize,
) -> ScanResult<Vec<FileScores>>
where
    F: Fn(&Path) -> bool,
{
    let reports = CorpusScanner::new(parallelism).scan(root, predicate, queries)?;
    Ok(reports
        .into_iter()
        .filter_map(|report| {
            report.outcome.ok().map(|scores| FileScores {
                path: report.path,
                scores,
            })
        })
        .collect())
}

/// Result of a full scan
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub statistics: CorpusStatistics,
    /// Per-file tables in enumeration order
    pub files: Vec<FileScores>,
    pub metrics: ScanMetrics,
}

/// Compiles the configured queries, scans the corpus and aggregates the results
pub fn run(config: &ScanConfig) -> ScanResult<ScanOutput> {
    let queries = QuerySet::compile(config.all_queries(), config.strict_queries)?;
    info!(
        "Starting scan of {} with {} queries",
        config.root_path.display(),
        queries.len()
    );

    let mut aggregator = ResultAggregator::new(&queries, config.high_frequency_threshold);
    let mut metrics = ScanMetrics::new();
    let mut files = Vec::new();

    if queries.is_empty() {
        check_root(&config.root_path)?;
        debug!("No valid queries, skipping corpus walk");
        return Ok(ScanOutput {
            statistics: aggregator.finish(),
            files,
            metrics,
        });
    }

    let scanner = CorpusScanner::from_config(config)?;
    let selector = FileSelector::from_config(config);
    let reports = scanner.scan(&config.root_path, |path| selector.matches(path), &queries)?;

    for report in reports {
        metrics.record(&report);
        match report.outcome {
            Ok(scores) => {
                let file = FileScores {
                    path: report.path,
                    scores,
                };
                aggregator.add_file_scores(file.clone());
                files.push(file);
            }
            Err(e) => aggregator.add_failure(FailedFile {
                path: report.path,
                reason: e.to_string(),
            }),
        }
    }

    metrics.log_stats();
    let statistics = aggregator.finish();
    info!(
        "Scan complete. {} files scored, {} skipped",
        statistics.files_scanned,
        statistics.failed_files.len()
    );

    Ok(ScanOutput {
        statistics,
        files,
        metrics,
    })
}
