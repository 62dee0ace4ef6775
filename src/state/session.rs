use crate::storage::StorageError;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt;

/// Why a crawl session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The walker ran out of listing pages
    Exhausted,

    /// An article (or a whole listing page) older than the cutoff was reached
    Cutoff,

    /// The article limit was reached
    Limit,

    /// The session was cancelled from outside
    Cancelled,

    /// Persisting an article failed; the crawl stopped early
    StorageFailure,
}

impl StopReason {
    /// Converts the stop reason to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Cutoff => "cutoff",
            Self::Limit => "limit",
            Self::Cancelled => "cancelled",
            Self::StorageFailure => "storage_failure",
        }
    }

    /// Parses a stop reason from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "exhausted" => Some(Self::Exhausted),
            "cutoff" => Some(Self::Cutoff),
            "limit" => Some(Self::Limit),
            "cancelled" => Some(Self::Cancelled),
            "storage_failure" => Some(Self::StorageFailure),
            _ => None,
        }
    }

    /// Returns true for the stop reasons that mean the crawl did its job
    pub fn is_natural(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Cutoff | Self::Limit)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Per-session tallies
///
/// Every link a listing page yields ends up in exactly one of these buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    /// Listing pages visited
    pub pages_visited: u32,

    /// Articles persisted in this session
    pub fetched: u32,

    /// Links skipped because the article was already known
    pub skipped_duplicate: u32,

    /// Links or articles rejected by the keyword filter
    pub skipped_filtered: u32,

    /// Articles older than the cutoff
    pub skipped_cutoff: u32,

    /// Fetches or extractions that failed
    pub failed: u32,

    /// Links that were never fetched because the session was closing
    pub dropped: u32,

    /// Articles fetched after the session closed, not persisted
    pub discarded: u32,
}

/// Mutable state of one crawl session
///
/// Owned by the orchestrator for the duration of a crawl and passed around
/// explicitly.
#[derive(Debug)]
pub struct CrawlSession {
    board: String,
    keyword: String,
    cutoff: NaiveDateTime,
    max_articles: Option<u32>,
    seen: HashSet<String>,
    cutoff_reached: bool,
    pub counters: CrawlCounters,
}

impl CrawlSession {
    /// Creates a new session
    ///
    /// # Arguments
    ///
    /// * `board` - Board being crawled
    /// * `keyword` - Keyword filter, empty for none
    /// * `cutoff` - Articles created before this instant are not persisted
    /// * `max_articles` - Optional cap on persisted articles
    pub fn new(
        board: impl Into<String>,
        keyword: impl Into<String>,
        cutoff: NaiveDateTime,
        max_articles: Option<u32>,
    ) -> Self {
        Self {
            board: board.into(),
            keyword: keyword.into(),
            cutoff,
            max_articles,
            seen: HashSet::new(),
            cutoff_reached: false,
            counters: CrawlCounters::default(),
        }
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    /// Marks an article identifier as seen in this session
    ///
    /// Returns false if it was already seen, either in this session or in
    /// `known`.
    pub fn admit(&mut self, id: &str, known: &HashSet<String>) -> bool {
        if known.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    /// Returns true if `created_at` is older than the cutoff
    pub fn is_past_cutoff(&self, created_at: NaiveDateTime) -> bool {
        created_at < self.cutoff
    }

    pub fn mark_cutoff_reached(&mut self) {
        self.cutoff_reached = true;
    }

    pub fn cutoff_reached(&self) -> bool {
        self.cutoff_reached
    }

    /// Returns true once the article limit has been met
    pub fn limit_reached(&self) -> bool {
        self.max_articles
            .is_some_and(|max| self.counters.fetched >= max)
    }

    /// Articles that may still be persisted, `None` when unlimited
    pub fn remaining(&self) -> Option<u32> {
        self.max_articles
            .map(|max| max.saturating_sub(self.counters.fetched))
    }

    /// Closes the session, turning it into a summary
    pub fn into_summary(
        self,
        stop_reason: StopReason,
        fatal: Option<StorageError>,
    ) -> CrawlSummary {
        CrawlSummary {
            board: self.board,
            keyword: self.keyword,
            counters: self.counters,
            stop_reason,
            fatal,
        }
    }
}

/// Result of a crawl session
#[derive(Debug)]
pub struct CrawlSummary {
    pub board: String,
    pub keyword: String,
    pub counters: CrawlCounters,
    pub stop_reason: StopReason,

    /// The storage failure that stopped the session, if any
    pub fatal: Option<StorageError>,
}

impl CrawlSummary {
    pub fn fetched(&self) -> u32 {
        self.counters.fetched
    }

    /// Total links skipped for any reason other than failure
    pub fn skipped(&self) -> u32 {
        self.counters.skipped_duplicate
            + self.counters.skipped_filtered
            + self.counters.skipped_cutoff
    }

    pub fn failed(&self) -> u32 {
        self.counters.failed
    }

    /// Returns true if the session ended without a fatal error
    pub fn is_clean(&self) -> bool {
        self.fatal.is_none()
    }
}
