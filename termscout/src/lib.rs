pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod query;
pub mod results;
pub mod scan;

pub use config::{EncodingMode, ScanConfig};
pub use errors::{ScanError, ScanResult};
pub use query::{count_occurrences, evaluate, CompiledQuery, Expr, QuerySet};
pub use results::{
    aggregate, CorpusStatistics, FileScores, QueryStatistics, ResultAggregator, ScoreTable,
    HIGH_FREQUENCY_THRESHOLD,
};
pub use scan::{run, CorpusScanner, FileWorker, ScanOutput};
