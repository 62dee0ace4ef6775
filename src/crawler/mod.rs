//! Crawler module for board harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `Transport` trait
//! - Walking listing pages backward through time
//! - Bounded-concurrency article fetching
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod filter;
mod pagination;
mod scheduler;

pub use coordinator::{validate_board, Coordinator, CrawlRequest, SourceSettings};
pub use fetcher::{build_http_client, HttpTransport, Transport};
pub use filter::{KeywordFilter, Verdict};
pub use pagination::{listing_start_url, EndOfPagination, PageStep, PaginationWalker};
pub use scheduler::{
    ExtractContext, FailureCause, FetchFailure, FetchOutcome, FetchPool, FetchScheduler,
};

use crate::config::{resolve_encoding, Config};
use crate::extract::dates::{board_today, cutoff_from_days};
use crate::state::CrawlSummary;
use crate::storage::{ArticleQueries, RunLog, SqliteStorage};
use crate::HarvestError;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-invocation crawl parameters, usually built from the config and the
/// command line
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub board: String,
    pub keyword: String,
    pub cutoff_days: u32,
    pub max_articles: Option<u32>,
    pub concurrency: u32,

    /// Listing page to start from instead of the newest one
    pub start_page: Option<String>,
}

impl CrawlOptions {
    /// Options for `board` with the configured defaults
    pub fn from_config(config: &Config, board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            keyword: String::new(),
            cutoff_days: config.crawler.cutoff_days,
            max_articles: config.crawler.max_articles,
            concurrency: config.crawler.max_concurrent_fetches,
            start_page: None,
        }
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the database and load the board's known article identifiers
/// 2. Record a new run
/// 3. Build the HTTP transport
/// 4. Walk, fetch, filter and persist until a stop condition
/// 5. Record how the run ended
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `options` - Board, keyword and limits for this run
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `shutdown` - Cancelling this token stops the crawl
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The crawl ran; check `is_clean()` for storage failures
/// * `Err(HarvestError)` - The crawl could not start
pub async fn run_crawl(
    config: &Config,
    options: &CrawlOptions,
    config_hash: &str,
    shutdown: CancellationToken,
) -> Result<CrawlSummary, HarvestError> {
    let concurrency = usize::try_from(options.concurrency)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| HarvestError::InvalidRequest("concurrency must be positive".to_string()))?;
    validate_board(&options.board)?;

    let today = board_today(config.source.utc_offset_minutes);
    let request = CrawlRequest {
        board: options.board.clone(),
        keyword: options.keyword.trim().to_string(),
        cutoff: cutoff_from_days(today, options.cutoff_days),
        max_articles: options.max_articles,
        concurrency,
        start_page: options.start_page.as_deref().map(Url::parse).transpose()?,
    };
    request.validate()?;

    let settings = SourceSettings {
        base_url: Url::parse(&config.source.base_url)?,
        today,
        fallback: resolve_encoding(&config.source.fallback_encoding)?,
        timeout: Duration::from_secs(config.crawler.request_timeout_secs),
    };

    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let mut known = if config.crawler.refresh_known {
        HashSet::new()
    } else {
        storage.known_identifiers(&request.board)?
    };
    tracing::info!(
        "{} articles of {} already stored",
        known.len(),
        request.board
    );

    let run_id = storage.begin_run(&request.board, &request.keyword, config_hash)?;
    let transport = HttpTransport::new(&config.source)?;

    let mut coordinator = Coordinator::new(transport, storage, settings, shutdown);
    let summary = coordinator.crawl(&request, &mut known).await?;

    if let Err(e) = coordinator.storage_mut().finish_run(run_id, &summary) {
        tracing::warn!("Failed to record the end of run {}: {}", run_id, e);
    }

    Ok(summary)
}
