//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Walking listing pages newest first
//! - Filtering out known, duplicate and non-matching links
//! - Handing each page's links to the fetch pool and draining the outcomes
//! - Applying the cutoff and the article limit
//! - Persisting articles and their pushes
//!
//! Pages are handled one batch at a time: every link of a page has an outcome
//! before the next page is requested.

use crate::crawler::fetcher::Transport;
use crate::crawler::filter::{KeywordFilter, Verdict};
use crate::crawler::pagination::{listing_start_url, EndOfPagination, PageStep, PaginationWalker};
use crate::crawler::scheduler::{ExtractContext, FetchOutcome, FetchScheduler};
use crate::model::{Article, ArticleLink};
use crate::state::{CrawlSession, CrawlSummary, StopReason};
use crate::storage::{Storage, StorageError};
use crate::HarvestError;
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What to crawl
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub board: String,

    /// Keyword filter, empty for none
    pub keyword: String,

    /// Articles created before this instant are not persisted
    pub cutoff: NaiveDateTime,

    pub max_articles: Option<u32>,
    pub concurrency: NonZeroUsize,

    /// Listing page to start from instead of the newest one
    pub start_page: Option<Url>,
}

impl CrawlRequest {
    /// Checks the request before any network activity
    pub fn validate(&self) -> Result<(), HarvestError> {
        validate_board(&self.board)?;
        if self.max_articles == Some(0) {
            return Err(HarvestError::InvalidRequest(
                "max articles must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Board names are short ASCII identifiers
pub fn validate_board(board: &str) -> Result<(), HarvestError> {
    let valid = !board.is_empty()
        && board
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(HarvestError::InvalidRequest(format!(
            "invalid board name {board:?}"
        )))
    }
}

/// Source-level settings shared by every session
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: Url,

    /// Board-local date, used to infer listing years
    pub today: NaiveDate,

    pub fallback: &'static Encoding,

    /// Per-request timeout for listing and article pages
    pub timeout: Duration,
}

/// Main crawler coordinator structure
pub struct Coordinator<T, S> {
    transport: Arc<T>,
    storage: S,
    settings: SourceSettings,
    shutdown: CancellationToken,
}

impl<T: Transport + 'static, S: Storage> Coordinator<T, S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `transport` - Used for listing and article pages
    /// * `storage` - Where articles and pushes are persisted
    /// * `settings` - Source-level settings
    /// * `shutdown` - Cancelling this token stops the crawl
    pub fn new(
        transport: T,
        storage: S,
        settings: SourceSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            storage,
            settings,
            shutdown,
        }
    }

    /// Stops the running session; in-flight fetches finish, queued ones are dropped
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Runs one crawl session
    ///
    /// `known` holds identifiers persisted before; articles persisted by this
    /// session are added to it.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The session ran; a storage failure is reported
    ///   in the summary's `fatal` field
    /// * `Err(HarvestError)` - The request was invalid
    pub async fn crawl(
        &mut self,
        request: &CrawlRequest,
        known: &mut HashSet<String>,
    ) -> Result<CrawlSummary, HarvestError> {
        request.validate()?;

        let start = match &request.start_page {
            Some(url) => url.clone(),
            None => listing_start_url(&self.settings.base_url, &request.board, &request.keyword)?,
        };
        tracing::info!(
            "Crawling board {} from {} (cutoff {}, limit {:?}, concurrency {})",
            request.board,
            start,
            request.cutoff,
            request.max_articles,
            request.concurrency
        );

        let mut session = CrawlSession::new(
            request.board.as_str(),
            request.keyword.as_str(),
            request.cutoff,
            request.max_articles,
        );
        let filter = KeywordFilter::new(&request.keyword);
        let session_token = self.shutdown.child_token();

        let mut walker = PaginationWalker::new(
            Arc::clone(&self.transport),
            start,
            request.cutoff,
            self.settings.today,
            self.settings.fallback,
            self.settings.timeout,
        );
        let scheduler = FetchScheduler::new(
            Arc::clone(&self.transport),
            request.concurrency,
            self.settings.timeout,
            ExtractContext {
                board: request.board.clone(),
                fallback: self.settings.fallback,
            },
        );

        let mut fatal: Option<StorageError> = None;

        let stop_reason = loop {
            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                step = walker.next_page() => Some(step),
            };
            let Some(step) = step else {
                break StopReason::Cancelled;
            };

            let page = match step {
                PageStep::Page(page) => page,
                PageStep::End(EndOfPagination::PastCutoff) => break StopReason::Cutoff,
                PageStep::End(end) => {
                    tracing::debug!("Pagination ended: {:?}", end);
                    break StopReason::Exhausted;
                }
            };
            session.counters.pages_visited += 1;

            let mut deferred = HashSet::new();
            let batch = admit_links(&mut session, &filter, page.links, known, &mut deferred);
            if !batch.is_empty() {
                let mut pool = scheduler.start(session_token.clone());
                let mut unsubmitted = batch.into_iter();
                loop {
                    let window = submission_window(&session, scheduler.concurrency());
                    while !session_token.is_cancelled() && pool.pending() < window {
                        let Some(link) = unsubmitted.next() else {
                            break;
                        };
                        if let Err(link) = pool.submit(link).await {
                            tracing::error!("Fetch queue closed early, dropping {}", link.url);
                            session.counters.dropped += 1;
                            break;
                        }
                    }

                    let Some(outcome) = pool.next_outcome().await else {
                        break;
                    };
                    let accepting = fatal.is_none() && !session.limit_reached();
                    if let Err(e) = self.handle_outcome(
                        &mut session,
                        &filter,
                        &deferred,
                        outcome,
                        known,
                        accepting,
                    ) {
                        tracing::error!("Storage failure, stopping crawl: {}", e);
                        fatal = Some(e);
                        session_token.cancel();
                    }
                    if session.limit_reached() && !session_token.is_cancelled() {
                        tracing::info!("Article limit reached");
                        session_token.cancel();
                    }
                }

                let never_started = unsubmitted.len();
                if never_started > 0 {
                    tracing::debug!("Dropping {} links that were never submitted", never_started);
                    session.counters.dropped += never_started as u32;
                }
                pool.shutdown().await;
            }

            tracing::info!(
                "Progress: {} pages, {} fetched, {} skipped, {} failed",
                session.counters.pages_visited,
                session.counters.fetched,
                session.counters.skipped_duplicate
                    + session.counters.skipped_filtered
                    + session.counters.skipped_cutoff,
                session.counters.failed
            );

            if fatal.is_some() {
                break StopReason::StorageFailure;
            }
            if session.limit_reached() {
                break StopReason::Limit;
            }
            if session.cutoff_reached() {
                break StopReason::Cutoff;
            }
            if self.shutdown.is_cancelled() {
                break StopReason::Cancelled;
            }
        };

        session_token.cancel();
        tracing::info!(
            "Crawl of {} finished ({}): {} fetched",
            request.board,
            stop_reason,
            session.counters.fetched
        );
        Ok(session.into_summary(stop_reason, fatal))
    }

    /// Applies one fetch outcome to the session
    ///
    /// Only a storage error is returned; everything else is counted.
    fn handle_outcome(
        &mut self,
        session: &mut CrawlSession,
        filter: &KeywordFilter,
        deferred: &HashSet<String>,
        outcome: FetchOutcome,
        known: &mut HashSet<String>,
        accepting: bool,
    ) -> Result<(), StorageError> {
        let article = match outcome {
            FetchOutcome::Fetched(article) => article,
            FetchOutcome::Failed(failure) => {
                tracing::warn!("{}", failure);
                session.counters.failed += 1;
                return Ok(());
            }
            FetchOutcome::Dropped(link) => {
                tracing::debug!("Dropped {} (session closing)", link.url);
                session.counters.dropped += 1;
                return Ok(());
            }
        };

        if !accepting {
            tracing::debug!("Discarding {} fetched after the session closed", article.id);
            session.counters.discarded += 1;
            return Ok(());
        }

        if deferred.contains(&article.id) && !filter.matches_article(&article) {
            session.counters.skipped_filtered += 1;
            return Ok(());
        }

        if session.is_past_cutoff(article.created_at) {
            tracing::debug!(
                "{} created {} is older than the cutoff",
                article.id,
                article.created_at
            );
            session.counters.skipped_cutoff += 1;
            session.mark_cutoff_reached();
            return Ok(());
        }

        let existed = self.persist(&article)?;
        session.counters.fetched += 1;
        known.insert(article.id.clone());
        tracing::info!(
            "{} [{}] {} ({} pushes)",
            if existed { "Updated" } else { "Saved" },
            article.id,
            article.title,
            article.comments().len()
        );
        Ok(())
    }

    /// Upserts the article and its pushes; returns whether it was stored before
    fn persist(&mut self, article: &Article) -> Result<bool, StorageError> {
        let existed = self.storage.exists(&article.board, &article.id)?;
        self.storage.save_article(article)?;
        Ok(existed)
    }
}

/// Drops links already known or already seen, and applies the keyword filter
///
/// Links whose title the listing did not show are admitted and their ids
/// recorded in `deferred` so the filter can run after extraction.
fn admit_links(
    session: &mut CrawlSession,
    filter: &KeywordFilter,
    links: Vec<ArticleLink>,
    known: &HashSet<String>,
    deferred: &mut HashSet<String>,
) -> Vec<ArticleLink> {
    let mut batch = Vec::with_capacity(links.len());
    for link in links {
        if !session.admit(&link.id, known) {
            session.counters.skipped_duplicate += 1;
            continue;
        }
        match filter.verdict(&link) {
            Verdict::Accept => batch.push(link),
            Verdict::Reject => session.counters.skipped_filtered += 1,
            Verdict::Defer => {
                deferred.insert(link.id.clone());
                batch.push(link);
            }
        }
    }
    batch
}

/// How many links may be queued or in flight at once
///
/// Never more than the pool size, and never more than the articles the
/// session may still persist, so reaching the limit leaves nothing to discard
/// unless a fetch fails or an article is filtered out.
fn submission_window(session: &CrawlSession, concurrency: usize) -> usize {
    match session.remaining() {
        Some(remaining) => concurrency.min(remaining as usize),
        None => concurrency,
    }
}
