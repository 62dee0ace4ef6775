//! Storage module for persisting harvested articles
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent article and push upserts
//! - Article queries for the front end
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ArticleQueries, RunLog, Storage, StorageError, StorageResult};

use crate::state::StopReason;

/// Database totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total_articles: u64,
    pub total_comments: u64,
    pub boards: u64,
    pub authors: u64,

    /// Creation time of the newest stored article
    pub newest_article: Option<String>,

    /// Creation time of the oldest stored article
    pub oldest_article: Option<String>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub board: String,
    pub keyword: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub fetched: u32,
    pub skipped: u32,
    pub failed: u32,
    pub pages_visited: u32,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Finished(StopReason),
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished(reason) => reason.to_db_string(),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            other => StopReason::from_db_string(other).map(Self::Finished),
        }
    }
}
