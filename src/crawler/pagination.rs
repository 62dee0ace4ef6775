//! Pagination walker
//!
//! Walks a board's listing pages from the newest backward, one page at a
//! time. Pages are strictly sequential: the next page is only fetched when
//! the caller asks for it.

use crate::crawler::fetcher::Transport;
use crate::extract::extract_listing;
use crate::model::ListingPage;
use crate::state::WalkerState;
use crate::{PaginationError, TransportError};
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Consecutive pages without a single link after which the walk ends
const MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 2;

/// One step of the walk
#[derive(Debug)]
pub enum PageStep {
    /// A listing page; its links are ready for scheduling
    Page(ListingPage),

    /// The walk is over
    End(EndOfPagination),
}

/// Why the walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfPagination {
    /// The last page had no older page
    NoOlderPage,

    /// Every article on the page was listed before the cutoff date
    PastCutoff,

    /// Too many consecutive empty pages
    EmptyPages,

    /// A listing page could not be fetched or understood
    Failed(PaginationError),
}

/// Builds the first listing page URL for a board
///
/// With a keyword the board's search endpoint is used, which already narrows
/// results on the server side; otherwise the newest index page.
pub fn listing_start_url(base: &Url, board: &str, keyword: &str) -> Result<Url, url::ParseError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return base.join(&format!("bbs/{board}/index.html"));
    }

    let mut url = base.join(&format!("bbs/{board}/search"))?;
    url.query_pairs_mut().append_pair("q", keyword);
    Ok(url)
}

/// Produces listing pages newest first until the board's history runs out
pub struct PaginationWalker<T> {
    transport: Arc<T>,
    cursor: Option<Url>,
    state: WalkerState,
    cutoff: NaiveDateTime,
    today: NaiveDate,
    fallback: &'static Encoding,
    timeout: Duration,
    consecutive_empty: u32,
}

impl<T: Transport> PaginationWalker<T> {
    /// Creates a walker positioned at `start`
    ///
    /// # Arguments
    ///
    /// * `transport` - Used to fetch listing pages
    /// * `start` - The newest listing page (or an explicit starting page)
    /// * `cutoff` - A page whose newest article predates this ends the walk
    /// * `today` - Board-local date, used to infer listing years
    /// * `fallback` - Encoding for pages that are not valid UTF-8
    /// * `timeout` - Per-page fetch timeout
    pub fn new(
        transport: Arc<T>,
        start: Url,
        cutoff: NaiveDateTime,
        today: NaiveDate,
        fallback: &'static Encoding,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cursor: Some(start),
            state: WalkerState::AtNewest,
            cutoff,
            today,
            fallback,
            timeout,
            consecutive_empty: 0,
        }
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    /// Fetches the next (older) listing page
    ///
    /// Once this returns [`PageStep::End`] every later call returns
    /// `End(NoOlderPage)` without touching the network.
    pub async fn next_page(&mut self) -> PageStep {
        if self.state.is_terminal() {
            return PageStep::End(EndOfPagination::NoOlderPage);
        }
        let Some(url) = self.cursor.take() else {
            return self.finish(EndOfPagination::NoOlderPage);
        };

        tracing::debug!("Fetching listing page {}", url);
        let bytes = match self.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(source) => {
                let error = PaginationError::Unreachable {
                    url: url.to_string(),
                    source,
                };
                tracing::warn!("{}", error);
                return self.finish(EndOfPagination::Failed(error));
            }
        };

        let page = match extract_listing(&bytes, &url, self.today, self.fallback) {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!("{}", error);
                return self.finish(EndOfPagination::Failed(error));
            }
        };

        if page.links.is_empty() {
            self.consecutive_empty += 1;
            if self.consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
                tracing::info!("{} consecutive empty listing pages", self.consecutive_empty);
                return self.finish(EndOfPagination::EmptyPages);
            }
        } else {
            self.consecutive_empty = 0;
        }

        if let Some(newest) = page.newest_date() {
            if newest < self.cutoff.date() {
                tracing::info!("Listing page {} predates the cutoff ({})", url, newest);
                return self.finish(EndOfPagination::PastCutoff);
            }
        }

        self.cursor = page.older_page.clone();
        self.state = WalkerState::after_page(self.cursor.is_some());
        PageStep::Page(page)
    }

    async fn fetch(&self, url: &Url) -> Result<bytes::Bytes, TransportError> {
        match tokio::time::timeout(self.timeout, self.transport.fetch(url, self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }

    fn finish(&mut self, reason: EndOfPagination) -> PageStep {
        self.state = WalkerState::Exhausted;
        self.cursor = None;
        PageStep::End(reason)
    }
}
