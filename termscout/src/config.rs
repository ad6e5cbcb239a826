use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScanError, ScanResult};
use crate::query::expand_matrix;
use crate::results::HIGH_FREQUENCY_THRESHOLD;

/// Configuration for a corpus scan.
///
/// # Configuration Locations
///
/// Sources are layered, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/termscout/config.yaml`
/// 2. Local `.termscout.yaml` in the current directory
/// 3. Custom config file passed via `--config`
///
/// # Configuration Format
///
/// ```yaml
/// root_path: "corpus"
///
/// queries:
///   - "NSCLC AND sotorasib"
///   - "(KRAS OR EGFR) AND NSCLC NOT review"
///
/// # Cartesian product of AND-ed axes, appended after `queries`
/// query_matrix:
///   - ["GSTP1", "MLH1"]
///   - ["Breast cancer", "Lung cancer"]
///   - ["DNA methylation"]
///
/// file_extensions: ["txt"]
/// ignore_patterns: ["**/drafts/**"]
/// max_workers: 4
/// high_frequency_threshold: 5
/// encoding_mode: "lossy"
/// file_timeout: "30s"
/// strict_queries: false
/// show_progress: true
/// log_level: "info"
/// ```
///
/// Command-line arguments take precedence over file values; see `merge_with_cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Query strings evaluated against every file
    #[serde(default)]
    pub queries: Vec<String>,

    /// Term axes expanded into `AND` queries
    #[serde(default)]
    pub query_matrix: Vec<Vec<String>>,

    /// Root directory of the corpus
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// File extensions to include, compared case-insensitively.
    /// `None` selects every file.
    #[serde(default = "default_extensions")]
    pub file_extensions: Option<Vec<String>>,

    /// Glob patterns of paths to skip
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Upper bound on worker threads; the pool never exceeds the number of cores
    #[serde(default = "default_max_workers")]
    pub max_workers: NonZeroUsize,

    /// Minimum score for a file to be listed as high-frequency
    #[serde(default = "default_threshold")]
    pub high_frequency_threshold: u64,

    /// How to handle invalid UTF-8 in corpus files
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Per-file processing budget in humantime format (e.g. "30s", "2m")
    #[serde(default)]
    pub file_timeout: Option<String>,

    /// Abort the run on the first query that fails to parse
    #[serde(default)]
    pub strict_queries: bool,

    /// Draw a progress bar while files are processed
    #[serde(default)]
    pub show_progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Controls how invalid UTF-8 sequences are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// The file is skipped and recorded as failed
    #[default]
    FailFast,
    /// Invalid sequences are replaced with U+FFFD and the file is scored
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" => Ok(EncodingMode::FailFast),
            "lossy" => Ok(EncodingMode::Lossy),
            other => Err(ScanError::config_error(format!(
                "unknown encoding mode '{}' (expected failfast or lossy)",
                other
            ))),
        }
    }
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions() -> Option<Vec<String>> {
    Some(vec!["txt".to_string()])
}

fn default_max_workers() -> NonZeroUsize {
    NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN)
}

fn default_threshold() -> u64 {
    HIGH_FREQUENCY_THRESHOLD
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            query_matrix: Vec::new(),
            root_path: default_root_path(),
            file_extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            max_workers: default_max_workers(),
            high_frequency_threshold: default_threshold(),
            encoding_mode: EncodingMode::default(),
            file_timeout: None,
            strict_queries: false,
            show_progress: false,
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Creates a configuration for the given corpus root and queries
    pub fn new<I, S>(root_path: impl Into<PathBuf>, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root_path: root_path.into(),
            queries: queries.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("termscout/config.yaml")),
            Some(PathBuf::from(".termscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if !cli.queries.is_empty() {
            self.queries = cli.queries;
        }
        if let Some(root) = cli.root_path {
            self.root_path = root;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        if let Some(workers) = cli.max_workers {
            self.max_workers = workers;
        }
        if let Some(threshold) = cli.high_frequency_threshold {
            self.high_frequency_threshold = threshold;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if cli.file_timeout.is_some() {
            self.file_timeout = cli.file_timeout;
        }
        if cli.strict_queries {
            self.strict_queries = true;
        }
        if let Some(progress) = cli.show_progress {
            self.show_progress = progress;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Explicit queries followed by the expanded query matrix
    pub fn all_queries(&self) -> Vec<String> {
        let mut queries = self.queries.clone();
        queries.extend(expand_matrix(&self.query_matrix));
        queries
    }

    /// Parsed per-file time budget
    pub fn file_timeout(&self) -> ScanResult<Option<Duration>> {
        self.file_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| {
                    ScanError::config_error(format!("invalid file_timeout '{}': {}", raw, e))
                })
            })
            .transpose()
    }

    /// Worker count: the configured cap, bounded by the available cores
    pub fn worker_count(&self) -> usize {
        self.max_workers.get().min(num_cpus::get()).max(1)
    }
}

/// Values supplied on the command line; `None`/empty leaves the file value alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub queries: Vec<String>,
    pub root_path: Option<PathBuf>,
    pub file_extensions: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub max_workers: Option<NonZeroUsize>,
    pub high_frequency_threshold: Option<u64>,
    pub encoding_mode: Option<EncodingMode>,
    pub file_timeout: Option<String>,
    pub strict_queries: bool,
    pub show_progress: Option<bool>,
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        config_path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
            queries: ["NSCLC AND sotorasib", "KRAS NOT review"]
            root_path: "corpus"
            file_extensions: ["txt", "md"]
            ignore_patterns: ["**/drafts/**"]
            max_workers: 2
            high_frequency_threshold: 3
            encoding_mode: "lossy"
            file_timeout: "45s"
            strict_queries: true
            log_level: "debug"
        "#,
        );

        let config = ScanConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.queries, vec!["NSCLC AND sotorasib", "KRAS NOT review"]);
        assert_eq!(config.root_path, PathBuf::from("corpus"));
        assert_eq!(
            config.file_extensions,
            Some(vec!["txt".to_string(), "md".to_string()])
        );
        assert_eq!(config.ignore_patterns, vec!["**/drafts/**".to_string()]);
        assert_eq!(config.max_workers, NonZeroUsize::new(2).unwrap());
        assert_eq!(config.high_frequency_threshold, 3);
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
        assert_eq!(
            config.file_timeout().unwrap(),
            Some(Duration::from_secs(45))
        );
        assert!(config.strict_queries);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = write_config(dir.path(), "queries: [\"cat\"]\n");

        let config = ScanConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("."));
        assert_eq!(config.file_extensions, Some(vec!["txt".to_string()]));
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(config.max_workers.get(), 4);
        assert_eq!(config.high_frequency_threshold, 5);
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
        assert_eq!(config.file_timeout().unwrap(), None);
        assert!(!config.strict_queries);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_query_matrix_appended() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
            queries: ["NSCLC"]
            query_matrix:
              - ["GSTP1", "MLH1"]
              - ["PCR"]
        "#,
        );

        let config = ScanConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(
            config.all_queries(),
            vec!["NSCLC", "GSTP1 AND PCR", "MLH1 AND PCR"]
        );
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = ScanConfig {
            queries: vec!["cat".to_string()],
            root_path: PathBuf::from("corpus"),
            ignore_patterns: vec!["*.tmp".to_string()],
            ..Default::default()
        };

        let merged = file_config.merge_with_cli(CliOverrides {
            queries: vec!["dog".to_string()],
            max_workers: NonZeroUsize::new(8),
            encoding_mode: Some(EncodingMode::Lossy),
            strict_queries: true,
            ..Default::default()
        });

        assert_eq!(merged.queries, vec!["dog"]); // CLI value
        assert_eq!(merged.root_path, PathBuf::from("corpus")); // File value
        assert_eq!(merged.ignore_patterns, vec!["*.tmp"]); // File value
        assert_eq!(merged.max_workers.get(), 8); // CLI value
        assert_eq!(merged.encoding_mode, EncodingMode::Lossy);
        assert!(merged.strict_queries);
    }

    #[test]
    fn test_worker_count_is_bounded_by_cores() {
        let mut config = ScanConfig::default();
        config.max_workers = NonZeroUsize::new(10_000).unwrap();
        assert_eq!(config.worker_count(), num_cpus::get());

        config.max_workers = NonZeroUsize::new(1).unwrap();
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_invalid_timeout() {
        let config = ScanConfig {
            file_timeout: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.file_timeout(), Err(ScanError::Config(_))));
    }

    #[test]
    fn test_encoding_mode_from_str() {
        assert_eq!("LOSSY".parse::<EncodingMode>().unwrap(), EncodingMode::Lossy);
        assert_eq!(
            "failfast".parse::<EncodingMode>().unwrap(),
            EncodingMode::FailFast
        );
        assert!("utf16".parse::<EncodingMode>().is_err());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
            queries: 123
            max_workers: "many"
        "#,
        );
        assert!(ScanConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScanConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
