//! bbs-harvest main entry point
//!
//! This is the command-line interface for the bulletin board harvester.

use anyhow::{bail, Context};
use bbs_harvest::config::{load_or_default, Config};
use bbs_harvest::crawler::{run_crawl, CrawlOptions};
use bbs_harvest::output::{export_articles, print_statistics, print_summary};
use bbs_harvest::storage::{ArticleQueries, RunLog, SqliteStorage, Storage};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// bbs-harvest: a cutoff-aware bulletin board harvester
///
/// Walks a board's listing pages from the newest backward, fetches the
/// articles with a bounded number of concurrent requests, and upserts them
/// with their pushes into a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "bbs-harvest")]
#[command(version)]
#[command(about = "A cutoff-aware bulletin board harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Board to crawl
    #[arg(short, long, required_unless_present_any = ["stats", "export"])]
    board: Option<String>,

    /// Only keep articles whose title contains this keyword
    #[arg(short, long, default_value = "")]
    keyword: String,

    /// Ignore articles older than this many days
    #[arg(long)]
    cutoff_days: Option<u32>,

    /// Stop after saving this many articles
    #[arg(long)]
    max_articles: Option<u32>,

    /// Maximum number of concurrent article fetches
    #[arg(long)]
    concurrency: Option<u32>,

    /// Database file, overriding the configuration
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Listing page to start from instead of the newest one
    #[arg(long, value_name = "URL")]
    start_page: Option<String>,

    /// Re-fetch articles that are already stored
    #[arg(long)]
    refresh: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "export")]
    stats: bool,

    /// Export stored articles as JSON to FILE and exit
    #[arg(long, value_name = "FILE", conflicts_with = "stats")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("No configuration file given, using defaults"),
    }

    if let Some(db_path) = &cli.db_path {
        config.output.database_path = db_path.display().to_string();
    }
    if cli.refresh {
        config.crawler.refresh_known = true;
    }

    // Handle different modes
    if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if let Some(path) = &cli.export {
        handle_export(&config, &cli, path)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_crawl(&config, &config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bbs_harvest=info,warn"),
            1 => EnvFilter::new("bbs_harvest=debug,info"),
            2 => EnvFilter::new("bbs_harvest=trace,debug"),
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

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let db_path = Path::new(&config.output.database_path);
    let storage = SqliteStorage::new(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let stats = storage.stats()?;
    let latest_run = storage.latest_run()?;
    print_statistics(&stats, db_path, latest_run.as_ref());

    Ok(())
}

/// Handles the --export mode: writes stored articles as JSON
fn handle_export(config: &Config, cli: &Cli, path: &Path) -> anyhow::Result<()> {
    let db_path = Path::new(&config.output.database_path);
    let storage = SqliteStorage::new(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let keyword = cli.keyword.trim();
    let mut articles = if keyword.is_empty() {
        storage.list_articles(cli.board.as_deref(), None, 0)?
    } else {
        storage.search_articles(keyword)?
    };
    if let Some(board) = &cli.board {
        articles.retain(|article| &article.board == board);
    }

    let written = export_articles(&articles, keyword, path)
        .with_context(|| format!("Failed to export to {}", path.display()))?;
    println!("✓ Exported {} articles to {}", written, path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, cli: &Cli) -> anyhow::Result<ExitCode> {
    let Some(board) = &cli.board else {
        bail!("--board is required to crawl");
    };

    let mut options = CrawlOptions::from_config(config, board.as_str());
    options.keyword = cli.keyword.clone();
    options.start_page = cli.start_page.clone();
    if let Some(days) = cli.cutoff_days {
        options.cutoff_days = days;
    }
    if let Some(max) = cli.max_articles {
        options.max_articles = Some(max);
    }
    if let Some(concurrency) = cli.concurrency {
        options.concurrency = concurrency;
    }

    // Stop gracefully on Ctrl-C
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            signal_token.cancel();
        }
    });

    let summary = run_crawl(config, &options, config_hash, shutdown)
        .await
        .context("Crawl failed")?;

    print_summary(&summary);
    println!();
    handle_stats(config)?;

    if summary.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
