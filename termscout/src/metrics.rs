use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::scan::processor::{FileReport, ReadStrategy};

/// Counters describing how a scan went.
///
/// Workers never touch this directly: each [`FileReport`] carries its own
/// figures and the coordinator folds them in after collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanMetrics {
    pub files_processed: u64,
    pub files_failed: u64,
    pub files_timed_out: u64,
    pub bytes_read: u64,
    pub queries_evaluated: u64,
    pub term_memo_hits: u64,
    pub term_memo_misses: u64,
    pub in_memory_reads: u64,
    pub mmap_reads: u64,
    #[serde(with = "duration_millis")]
    pub busy_time: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl ScanMetrics {
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one worker report into the totals
    pub fn record(&mut self, report: &FileReport) {
        self.bytes_read += report.bytes;
        self.queries_evaluated += report.queries_evaluated;
        self.term_memo_hits += report.memo_hits;
        self.term_memo_misses += report.memo_misses;
        self.busy_time += report.elapsed;

        match report.strategy {
            Some(ReadStrategy::InMemory) => self.in_memory_reads += 1,
            Some(ReadStrategy::Mmap) => self.mmap_reads += 1,
            None => {}
        }

        match &report.outcome {
            Ok(_) => self.files_processed += 1,
            Err(crate::ScanError::FileTimeout { .. }) => {
                self.files_failed += 1;
                self.files_timed_out += 1;
            }
            Err(_) => self.files_failed += 1,
        }
    }

    /// Share of term lookups answered from the per-document memo
    pub fn memo_hit_rate(&self) -> f64 {
        let lookups = self.term_memo_hits + self.term_memo_misses;
        if lookups == 0 {
            0.0
        } else {
            self.term_memo_hits as f64 / lookups as f64
        }
    }

    /// Logs the totals at info level
    pub fn log_stats(&self) {
        info!(
            "Scan stats:\n\
             Files processed/failed/timed out: {}/{}/{}\n\
             Bytes read: {}\n\
             Queries evaluated: {}\n\
             Term memo hits/misses: {}/{} ({:.1}% hit rate)\n\
             Reads (in-memory/mmap): {}/{}\n\
             Worker busy time: {}",
            self.files_processed,
            self.files_failed,
            self.files_timed_out,
            self.bytes_read,
            self.queries_evaluated,
            self.term_memo_hits,
            self.term_memo_misses,
            self.memo_hit_rate() * 100.0,
            self.in_memory_reads,
            self.mmap_reads,
            humantime::format_duration(self.busy_time)
        );
    }
}
