//! fipe-sync main entry point
//!
//! This is the command-line interface for the FIPE price table mirror.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fipe_sync::classifier::{run_classification_sweep, SegmentClassifier};
use fipe_sync::config::{load_config_or_default, Config};
use fipe_sync::crawler::{parse_months, parse_years, run_crawl, CrawlOptions, TracingProgress};
use fipe_sync::output::{format_crawl_report, load_statistics, print_statistics};
use fipe_sync::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// fipe-sync: an incremental mirror of the FIPE vehicle price tables
///
/// Crawls reference periods, brands, models, model-years and prices from
/// the FIPE API into SQLite. Interrupted or partially failed runs resume
/// from their checkpoints.
#[derive(Parser, Debug)]
#[command(name = "fipe-sync")]
#[command(version)]
#[command(about = "Incremental mirror of the FIPE vehicle price tables", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl FIPE data and store it in the database
    Crawl(CrawlArgs),

    /// Show database statistics and per-period checkpoint progress
    Status,

    /// Classify models without a segment
    Classify {
        /// Show what would be classified without making changes
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Specific reference table code
    #[arg(short, long, value_name = "CODE")]
    reference: Option<i64>,

    /// Year(s) to crawl (e.g. 2023, 2020-2023 or 2020,2022)
    #[arg(short, long, value_name = "YEARS")]
    year: Option<String>,

    /// Month(s) to crawl (e.g. 6, 1-6 or 1,3,6)
    #[arg(short = 'M', long, value_name = "MONTHS")]
    month: Option<String>,

    /// Specific brand code
    #[arg(short, long, value_name = "CODE")]
    brand: Option<String>,

    /// Specific model code(s); requires --brand
    #[arg(short, long, value_name = "CODE", requires = "brand", num_args = 1..)]
    model: Option<Vec<String>>,

    /// Classify new models by segment
    #[arg(short, long)]
    classify: bool,

    /// Clear the crawl status of each selected period first
    #[arg(long)]
    force: bool,
}

impl CrawlArgs {
    fn into_options(self) -> Result<CrawlOptions> {
        let years = self
            .year
            .as_deref()
            .map(parse_years)
            .transpose()
            .context("Invalid --year")?;
        let months = self
            .month
            .as_deref()
            .map(parse_months)
            .transpose()
            .context("Invalid --month")?;

        Ok(CrawlOptions {
            reference_code: self.reference,
            years,
            months,
            brand_code: self.brand,
            model_codes: self.model,
            classify: self.classify,
            force: self.force,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config_or_default(cli.config.as_deref()).with_context(|| {
        match &cli.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Invalid default configuration".to_string(),
        }
    })?;

    let result = match cli.command {
        Command::Crawl(args) => handle_crawl(&config, args).await,
        Command::Status => handle_status(&config),
        Command::Classify { dry_run } => handle_classify(&config, dry_run).await,
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fipe_sync=info,warn"),
            1 => EnvFilter::new("fipe_sync=debug,info"),
            2 => EnvFilter::new("fipe_sync=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `crawl`: runs one pass over the selected periods
async fn handle_crawl(config: &Config, args: CrawlArgs) -> Result<()> {
    let options = args.into_options()?;
    tracing::info!("Database: {}", config.storage.database_path);

    let report = run_crawl(config, &options).await.context("Crawl failed")?;
    print!("{}", format_crawl_report(&report));

    Ok(())
}

/// Handles `status`: shows statistics from the database
fn handle_status(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles `classify`: assigns segments to models that have none
async fn handle_classify(config: &Config, dry_run: bool) -> Result<()> {
    let mut storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .context("Failed to open database")?;

    let classifier = if dry_run {
        None
    } else {
        Some(SegmentClassifier::from_config(&config.classifier)?)
    };

    run_classification_sweep(&mut storage, classifier.as_ref(), &TracingProgress)
        .await
        .context("Classification failed")?;

    Ok(())
}
