/// Per-file score tables and the corpus-wide statistics folded from them.
///
/// Workers each produce an owned [`ScoreTable`] for their file and hand it
/// back to the coordinating thread; nothing here is shared between workers.
/// The [`ResultAggregator`] is the only consumer and runs single-threaded
/// after collection, so its counters need no synchronisation. Counting is a
/// commutative fold, which is what makes the counters independent of pool
/// size and file completion order; the high-frequency file lists follow the
/// order files are folded in.
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::query::{QuerySet, RejectedQuery};

/// Default minimum score for a file to count as high-frequency for a query
pub const HIGH_FREQUENCY_THRESHOLD: u64 = 5;

/// Scores of every query against one file, in query order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreTable {
    entries: Vec<(Arc<str>, u64)>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, query: Arc<str>, score: u64) {
        self.entries.push((query, score));
    }

    /// Score for a query, if the query is part of this table
    pub fn get(&self, query: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(q, _)| q.as_ref() == query)
            .map(|&(_, score)| score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(q, score)| (q.as_ref(), *score))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<Arc<str>>> FromIterator<(S, u64)> for ScoreTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(q, s)| (q.into(), s)).collect(),
        }
    }
}

impl Serialize for ScoreTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// The score table produced for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileScores {
    /// Path relative to the scan root
    pub path: PathBuf,
    pub scores: ScoreTable,
}

/// A file that was skipped for every query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Corpus-wide figures for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStatistics {
    pub query: String,
    /// Files where the query scored above zero
    pub files_containing: usize,
    /// Files where the query met the high-frequency threshold, in fold order
    pub high_frequency_files: Vec<PathBuf>,
}

impl QueryStatistics {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            files_containing: 0,
            high_frequency_files: Vec::new(),
        }
    }

    pub fn high_frequency_count(&self) -> usize {
        self.high_frequency_files.len()
    }
}

/// Presence and high-frequency statistics for a whole corpus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStatistics {
    pub threshold: u64,
    /// One entry per query, in query order
    pub queries: Vec<QueryStatistics>,
    pub files_scanned: usize,
    pub failed_files: Vec<FailedFile>,
    pub rejected_queries: Vec<RejectedQuery>,
}

impl CorpusStatistics {
    /// Query → number of files with a positive score
    pub fn presence_counts(&self) -> Vec<(&str, usize)> {
        self.queries
            .iter()
            .map(|q| (q.query.as_str(), q.files_containing))
            .collect()
    }

    /// Query → (high-frequency file count, those files)
    pub fn high_frequency(&self) -> Vec<(&str, usize, &[PathBuf])> {
        self.queries
            .iter()
            .map(|q| {
                (
                    q.query.as_str(),
                    q.high_frequency_count(),
                    q.high_frequency_files.as_slice(),
                )
            })
            .collect()
    }

    pub fn get(&self, query: &str) -> Option<&QueryStatistics> {
        self.queries.iter().find(|q| q.query == query)
    }
}

/// Folds per-file score tables into [`CorpusStatistics`]
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    stats: CorpusStatistics,
    index: HashMap<String, usize>,
}

impl ResultAggregator {
    /// Creates an aggregator with an empty row for every query, so queries that
    /// never score still appear in the output with zero counts
    pub fn new(queries: &QuerySet, threshold: u64) -> Self {
        let mut aggregator = Self::with_threshold(threshold);
        for query in queries.iter() {
            aggregator.row(query.text());
        }
        aggregator.stats.rejected_queries = queries.rejected().to_vec();
        aggregator
    }

    /// Creates an aggregator that learns queries from the tables it folds
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            stats: CorpusStatistics {
                threshold,
                ..Default::default()
            },
            index: HashMap::new(),
        }
    }

    fn row(&mut self, query: &str) -> &mut QueryStatistics {
        let idx = match self.index.get(query) {
            Some(&idx) => idx,
            None => {
                self.stats.queries.push(QueryStatistics::new(query));
                let idx = self.stats.queries.len() - 1;
                self.index.insert(query.to_string(), idx);
                idx
            }
        };
        &mut self.stats.queries[idx]
    }

    /// Folds one file's scores into the running statistics
    pub fn add_file_scores(&mut self, file: FileScores) {
        self.stats.files_scanned += 1;
        let threshold = self.stats.threshold;
        for (query, score) in file.scores.iter() {
            let row = self.row(query);
            if score > 0 {
                row.files_containing += 1;
            }
            if score >= threshold {
                row.high_frequency_files.push(file.path.clone());
            }
        }
    }

    /// Records a file that could not be scored
    pub fn add_failure(&mut self, failure: FailedFile) {
        self.stats.failed_files.push(failure);
    }

    /// Merges another partial aggregate into this one
    pub fn merge(&mut self, other: ResultAggregator) {
        let other = other.stats;
        self.stats.files_scanned += other.files_scanned;
        self.stats.failed_files.extend(other.failed_files);
        for query in other.queries {
            let row = self.row(&query.query);
            row.files_containing += query.files_containing;
            row.high_frequency_files.extend(query.high_frequency_files);
        }
        for rejected in other.rejected_queries {
            if !self.stats.rejected_queries.contains(&rejected) {
                self.stats.rejected_queries.push(rejected);
            }
        }
    }

    pub fn finish(self) -> CorpusStatistics {
        self.stats
    }
}

/// Folds a sequence of per-file tables with the given threshold
pub fn aggregate<I>(files: I, threshold: u64) -> CorpusStatistics
where
    I: IntoIterator<Item = FileScores>,
{
    let mut aggregator = ResultAggregator::with_threshold(threshold);
    for file in files {
        aggregator.add_file_scores(file);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, scores: &[(&str, u64)]) -> FileScores {
        FileScores {
            path: PathBuf::from(path),
            scores: scores.iter().map(|&(q, s)| (q, s)).collect(),
        }
    }

    #[test]
    fn test_score_table_lookup() {
        let table: ScoreTable = [("A AND B", 3), ("C", 0)].into_iter().collect();
        assert_eq!(table.get("A AND B"), Some(3));
        assert_eq!(table.get("C"), Some(0));
        assert_eq!(table.get("D"), None);
        assert_eq!(table.len(), 2);
        assert_eq!(
            serde_json::to_string(&table).unwrap(),
            r#"{"A AND B":3,"C":0}"#
        );
    }

    #[test]
    fn test_presence_and_high_frequency() {
        let stats = aggregate(
            vec![
                file("a.txt", &[("Q", 0)]),
                file("b.txt", &[("Q", 3)]),
                file("c.txt", &[("Q", 7)]),
            ],
            HIGH_FREQUENCY_THRESHOLD,
        );

        let q = stats.get("Q").unwrap();
        assert_eq!(q.files_containing, 2);
        assert_eq!(q.high_frequency_count(), 1);
        assert_eq!(q.high_frequency_files, vec![PathBuf::from("c.txt")]);
        assert_eq!(stats.files_scanned, 3);
        assert_eq!(stats.presence_counts(), vec![("Q", 2)]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let stats = aggregate(
            vec![file("four.txt", &[("Q", 4)]), file("five.txt", &[("Q", 5)])],
            5,
        );
        let (_, count, files) = stats.high_frequency()[0];
        assert_eq!(count, 1);
        assert_eq!(files, &[PathBuf::from("five.txt")]);
    }

    #[test]
    fn test_fold_order_does_not_change_counters() {
        let files = vec![
            file("a.txt", &[("X", 1), ("Y", 9)]),
            file("b.txt", &[("X", 0), ("Y", 5)]),
            file("c.txt", &[("X", 6), ("Y", 0)]),
        ];
        let forward = aggregate(files.clone(), 5);
        let backward = aggregate(files.into_iter().rev(), 5);

        for (f, b) in forward.queries.iter().zip(backward.queries.iter()) {
            assert_eq!(f.query, b.query);
            assert_eq!(f.files_containing, b.files_containing);
            assert_eq!(f.high_frequency_count(), b.high_frequency_count());
        }
    }

    #[test]
    fn test_merge_partial_aggregates() {
        let mut left = ResultAggregator::with_threshold(5);
        left.add_file_scores(file("a.txt", &[("Q", 8)]));
        left.add_failure(FailedFile {
            path: PathBuf::from("bad.txt"),
            reason: "Invalid UTF-8".to_string(),
        });

        let mut right = ResultAggregator::with_threshold(5);
        right.add_file_scores(file("b.txt", &[("Q", 2), ("R", 6)]));

        left.merge(right);
        let stats = left.finish();
        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.failed_files.len(), 1);
        assert_eq!(stats.get("Q").unwrap().files_containing, 2);
        assert_eq!(stats.get("Q").unwrap().high_frequency_count(), 1);
        assert_eq!(
            stats.get("R").unwrap().high_frequency_files,
            vec![PathBuf::from("b.txt")]
        );
    }

    #[test]
    fn test_queries_without_hits_are_listed() {
        let set = QuerySet::compile(["never seen", "(broken"], false).unwrap();
        let aggregator = ResultAggregator::new(&set, 5);
        let stats = aggregator.finish();
        assert_eq!(stats.presence_counts(), vec![("never seen", 0)]);
        assert_eq!(stats.rejected_queries.len(), 1);
    }
}
