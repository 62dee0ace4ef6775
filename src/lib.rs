//! bbs-harvest: a cutoff-aware bulletin board harvester
//!
//! This crate walks a board's listing pages backward through time, fetches the
//! articles they link to with a bounded pool of workers, extracts articles and
//! their pushes from the markup, and upserts them into a local SQLite database.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for bbs-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid crawl request: {0}")]
    InvalidRequest(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown encoding label: {0}")]
    InvalidEncoding(String),
}

/// A single article page could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("page has no article content")]
    MissingContent,

    #[error("unparseable article date: {0:?}")]
    InvalidDate(String),

    #[error("article has no creation date")]
    MissingDate,

    #[error("duplicate comment at position {0}")]
    DuplicateComment(u32),
}

/// A single fetch failed at the transport level
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

/// A listing page could not be fetched or understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("listing page {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("listing page {0} is not a board listing")]
    Malformed(String),
}

/// Result type alias for bbs-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlOptions, Transport};
pub use model::{Article, ArticleLink, Comment, ListingPage, Reaction};
pub use state::{CrawlSummary, StopReason};
