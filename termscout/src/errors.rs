/// Error types for query compilation, file scanning and configuration.
///
/// Errors fall into two groups. Per-unit errors (`MalformedQuery`, `InvalidTerm`,
/// `FileRead`, `Encoding`, `FileTimeout`) only ever affect one query or one file and
/// are recorded by the scanner, which then carries on with the rest of the corpus.
/// Run-level errors (`DirectoryEnumeration`, `ThreadPool`, `Config`) are surfaced to
/// the caller because there is nothing useful left to aggregate.
///
/// ```rust,ignore
/// match termscout::evaluate(text, "GSTP1 AND (PCR OR sequencing") {
///     Ok(score) => println!("score {score}"),
///     Err(ScanError::MalformedQuery { reason, .. }) => eprintln!("bad query: {reason}"),
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while compiling queries or scanning a corpus
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Malformed query '{query}': {reason}")]
    MalformedQuery { query: String, reason: String },
    #[error("Invalid term in query '{0}': terms must not be empty")]
    InvalidTerm(String),
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid UTF-8 in file {path}: {source}")]
    Encoding {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
    #[error("Processing {path} exceeded the time budget of {}", format_budget(.budget))]
    FileTimeout { path: PathBuf, budget: Duration },
    #[error("Cannot enumerate {path}: {reason}")]
    DirectoryEnumeration { path: PathBuf, reason: String },
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_budget(budget: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*budget)
}

impl ScanError {
    pub fn malformed(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedQuery {
            query: query.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_term(query: impl Into<String>) -> Self {
        Self::InvalidTerm(query.into())
    }

    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::str::Utf8Error) -> Self {
        Self::Encoding {
            path: path.into(),
            source,
        }
    }

    pub fn timeout(path: impl Into<PathBuf>, budget: Duration) -> Self {
        Self::FileTimeout {
            path: path.into(),
            budget,
        }
    }

    pub fn enumeration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DirectoryEnumeration {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
