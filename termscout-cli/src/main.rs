use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use itertools::Itertools;
use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf};
use termscout::{
    config::CliOverrides, query, CorpusStatistics, EncodingMode, FileWorker, QuerySet,
    ScanConfig, ScanOutput,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliScanConfig {
    /// Query to evaluate (can be specified multiple times)
    #[arg(short = 'q', long = "query")]
    queries: Vec<String>,

    /// File with one query per line; blank lines and lines starting with '#' are skipped
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Root directory of the corpus
    #[arg(short = 'd', long)]
    root: Option<PathBuf>,

    /// File extensions to include (e.g. txt,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Maximum number of worker threads (capped at the number of cores)
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Minimum score for a file to count as high-frequency
    #[arg(long)]
    threshold: Option<u64>,

    /// Per-file time budget (e.g. 30s, 2m)
    #[arg(long)]
    timeout: Option<String>,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Abort on the first query that fails to parse
    #[arg(long)]
    strict: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Draw a progress bar while scanning
    #[arg(long, conflicts_with = "no_progress")]
    progress: bool,

    /// Never draw a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Additional configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every corpus file against a batch of queries
    Scan(Box<CliScanConfig>),

    /// Score a single file
    Eval {
        /// File to score
        file: PathBuf,

        /// Query to evaluate (can be specified multiple times)
        #[arg(short = 'q', long = "query", required = true)]
        queries: Vec<String>,

        /// How to handle invalid UTF-8 sequences (failfast|lossy)
        #[arg(long, default_value = "failfast")]
        encoding: String,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "warn")]
        log_level: String,
    },

    /// Parse queries and print their canonical form
    Check {
        /// Query to check (can be specified multiple times)
        #[arg(short = 'q', long = "query", required = true)]
        queries: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan(*args),
        Commands::Eval {
            file,
            queries,
            encoding,
            log_level,
        } => {
            init_logging(&log_level);
            run_eval(&file, &queries, encoding.parse()?)
        }
        Commands::Check { queries } => {
            init_logging("warn");
            run_check(&queries)
        }
    }
}

/// Installs the stderr subscriber; RUST_LOG overrides the configured level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_query_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read query file {}", path.display()))?;
    Ok(parse_query_lines(&content))
}

fn parse_query_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn run_scan(args: CliScanConfig) -> Result<()> {
    let mut queries = args.queries;
    if let Some(path) = &args.query_file {
        queries.extend(read_query_file(path)?);
    }

    let overrides = CliOverrides {
        queries,
        root_path: args.root,
        file_extensions: args.extensions.as_ref().map(|e| {
            e.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        }),
        ignore_patterns: args.ignore,
        max_workers: args.threads,
        high_frequency_threshold: args.threshold,
        encoding_mode: args
            .encoding
            .as_deref()
            .map(str::parse::<EncodingMode>)
            .transpose()?,
        file_timeout: args.timeout,
        strict_queries: args.strict,
        show_progress: if args.no_progress || args.json {
            Some(false)
        } else if args.progress {
            Some(true)
        } else {
            None
        },
        log_level: args.log_level,
    };

    let config = ScanConfig::load_from(args.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(overrides);
    init_logging(&config.log_level);

    if config.queries.is_empty() && config.query_matrix.is_empty() {
        bail!("no queries given; pass -q, --query-file or set `queries` in a config file");
    }

    let output = termscout::run(&config)
        .with_context(|| format!("scan of {} failed", config.root_path.display()))?;

    if args.json {
        print_json(&output)?;
    } else {
        print_statistics(&output.statistics);
    }
    Ok(())
}

fn print_json(output: &ScanOutput) -> Result<()> {
    let value = serde_json::json!({
        "statistics": output.statistics,
        "files": output.files,
        "metrics": output.metrics,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_statistics(stats: &CorpusStatistics) {
    println!("{}", "Files containing each query (score > 0):".bold());
    for (query, count) in stats.presence_counts() {
        println!("{}  {}", format!("{:>6}", count).green(), query);
    }

    println!(
        "\n{}",
        format!("High-frequency files (score >= {}):", stats.threshold).bold()
    );
    for (query, count, files) in stats.high_frequency() {
        if files.is_empty() {
            println!("{}  {}", format!("{:>6}", count).green(), query);
        } else {
            let listed = files.iter().map(|p| p.display()).join(", ");
            println!(
                "{}  {}  [{}]",
                format!("{:>6}", count).green(),
                query,
                listed.blue()
            );
        }
    }

    if !stats.rejected_queries.is_empty() {
        println!("\n{}", "Rejected queries:".red().bold());
        for rejected in &stats.rejected_queries {
            println!("  {}: {}", rejected.query, rejected.reason);
        }
    }

    if !stats.failed_files.is_empty() {
        println!("\n{}", "Skipped files:".yellow().bold());
        for failed in &stats.failed_files {
            println!("  {}: {}", failed.path.display(), failed.reason);
        }
    }

    println!(
        "\nScanned {} files ({} skipped) with {} queries",
        stats.files_scanned,
        stats.failed_files.len(),
        stats.queries.len()
    );
}

fn run_eval(file: &Path, queries: &[String], encoding_mode: EncodingMode) -> Result<()> {
    let set = QuerySet::compile(queries, false)?;
    for rejected in set.rejected() {
        eprintln!("{} {}", "error:".red().bold(), rejected.reason);
    }
    if set.is_empty() {
        bail!("none of the {} queries could be parsed", queries.len());
    }

    let report = FileWorker::new(&set, encoding_mode).process(file);
    let scores = report
        .outcome
        .with_context(|| format!("failed to score {}", file.display()))?;
    for (query, score) in scores.iter() {
        println!("{}  {}", format!("{:>6}", score).green(), query);
    }
    Ok(())
}

fn run_check(queries: &[String]) -> Result<()> {
    let mut failures = 0;
    for text in queries {
        match query::compile(text) {
            Ok(expr) => println!("{}  {}", "ok".green(), expr),
            Err(e) => {
                failures += 1;
                println!("{}  {}", "error".red(), e);
            }
        }
    }
    if failures > 0 {
        bail!("{} of {} queries failed to parse", failures, queries.len());
    }
    Ok(())
}
