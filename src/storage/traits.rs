//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types. The crawler itself only needs [`Storage`]; the
//! query and run-log traits serve the command line front end.

use crate::model::{Article, Comment};
use crate::state::CrawlSummary;
use crate::storage::{RunRecord, StorageStats};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Article not found: {board}/{article_id}")]
    ArticleNotFound { board: String, article_id: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What the crawler needs from a storage backend
///
/// Every write is an upsert keyed on the article identifier, so persisting
/// the same article twice leaves one record with the later content.
pub trait Storage {
    /// Inserts or updates an article, keyed on (board, id)
    fn upsert_article(&mut self, article: &Article) -> StorageResult<()>;

    /// Inserts or updates the pushes of a stored article, keyed on position
    ///
    /// # Errors
    ///
    /// `ArticleNotFound` if the article has not been stored.
    fn upsert_comments(
        &mut self,
        board: &str,
        article_id: &str,
        comments: &[Comment],
    ) -> StorageResult<()>;

    /// Upserts an article together with its pushes
    ///
    /// Backends that support transactions override this so a failure never
    /// leaves a stored article next to stale pushes.
    fn save_article(&mut self, article: &Article) -> StorageResult<()> {
        self.upsert_article(article)?;
        self.upsert_comments(&article.board, &article.id, article.comments())
    }

    /// Checks whether an article has been stored
    fn exists(&self, board: &str, article_id: &str) -> StorageResult<bool>;

    /// Gets database totals
    fn stats(&self) -> StorageResult<StorageStats>;
}

/// Read access to stored articles
pub trait ArticleQueries: Storage {
    /// Gets an article with its pushes
    fn get_article(&self, board: &str, article_id: &str) -> StorageResult<Option<Article>>;

    /// Gets an article by its page URL
    fn get_article_by_url(&self, url: &str) -> StorageResult<Option<Article>>;

    /// Articles by one author, newest first
    fn articles_by_author(&self, author: &str) -> StorageResult<Vec<Article>>;

    /// Articles of a board (all boards when `None`), newest first
    ///
    /// `limit` of `None` returns every article after `offset`.
    fn list_articles(
        &self,
        board: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<Article>>;

    /// Articles whose title or body contains `keyword`, case-insensitively
    fn search_articles(&self, keyword: &str) -> StorageResult<Vec<Article>>;

    /// Deletes an article and its pushes; returns false if it did not exist
    fn delete_article(&mut self, board: &str, article_id: &str) -> StorageResult<bool>;

    /// Identifiers of every stored article of a board
    fn known_identifiers(&self, board: &str) -> StorageResult<HashSet<String>>;
}

/// Bookkeeping of crawl runs
pub trait RunLog {
    /// Records the start of a run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn begin_run(&mut self, board: &str, keyword: &str, config_hash: &str) -> StorageResult<i64>;

    /// Records how a run ended
    fn finish_run(&mut self, run_id: i64, summary: &CrawlSummary) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
