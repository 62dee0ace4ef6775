//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.
//! Article timestamps are stored as naive board-local `YYYY-MM-DD HH:MM:SS`
//! text, which sorts chronologically; bookkeeping timestamps are RFC 3339 UTC.

use crate::model::{Article, Comment, Reaction};
use crate::state::CrawlSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleQueries, RunLog, Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StorageStats};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ARTICLE_COLUMNS: &str = "id, board, article_id, title, author, body, created_at, url";

const RUN_COLUMNS: &str = "id, board, keyword, started_at, finished_at, config_hash, status, \
                           fetched, skipped, failed, pages_visited, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!("Opened database {}", path.display());

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn article_row_id(&self, board: &str, article_id: &str) -> StorageResult<Option<i64>> {
        article_row_id(&self.conn, board, article_id)
    }

    /// Runs an article query and loads each article's pushes
    fn query_articles<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<Article>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, read_article_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn query_article<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Option<Article>> {
        let row = self.conn.query_row(sql, params, read_article_row).optional()?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn hydrate(&self, row: ArticleRow) -> StorageResult<Article> {
        let mut article = Article::new(
            row.board,
            row.article_id,
            row.title,
            row.author,
            row.body,
            parse_db_datetime(&row.created_at)?,
            row.url,
        );
        for comment in self.load_comments(row.row_id, &article.id)? {
            article
                .push_comment(comment)
                .map_err(|e| StorageError::ConstraintViolation(e.to_string()))?;
        }
        Ok(article)
    }

    fn load_comments(&self, row_id: i64, article_id: &str) -> StorageResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, author, body, reaction, ip, created_at
             FROM comments WHERE article_row = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![row_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(position, author, body, reaction, ip, created_at)| {
                let reaction = Reaction::from_db_string(&reaction).ok_or_else(|| {
                    StorageError::Serialization(format!("unknown reaction {reaction:?}"))
                })?;
                Ok(Comment {
                    article_id: article_id.to_string(),
                    position,
                    author,
                    body,
                    reaction,
                    created_at: parse_db_datetime(&created_at)?,
                    ip,
                })
            })
            .collect()
    }
}

impl Storage for SqliteStorage {
    fn upsert_article(&mut self, article: &Article) -> StorageResult<()> {
        write_article(&self.conn, article, &Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn upsert_comments(
        &mut self,
        board: &str,
        article_id: &str,
        comments: &[Comment],
    ) -> StorageResult<()> {
        let row_id = self
            .article_row_id(board, article_id)?
            .ok_or_else(|| StorageError::ArticleNotFound {
                board: board.to_string(),
                article_id: article_id.to_string(),
            })?;

        let tx = self.conn.transaction()?;
        write_comments(&tx, row_id, comments, &Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(())
    }

    /// Writes the article and its pushes in one transaction
    fn save_article(&mut self, article: &Article) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let row_id = write_article(&tx, article, &now)?;
        write_comments(&tx, row_id, article.comments(), &now)?;
        tx.commit()?;
        Ok(())
    }

    fn exists(&self, board: &str, article_id: &str) -> StorageResult<bool> {
        Ok(self.article_row_id(board, article_id)?.is_some())
    }

    fn stats(&self) -> StorageResult<StorageStats> {
        let (total_articles, boards, authors, newest_article, oldest_article) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT board), COUNT(DISTINCT author),
                    MAX(created_at), MIN(created_at)
             FROM articles",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )?;
        let total_comments: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;

        Ok(StorageStats {
            total_articles: total_articles as u64,
            total_comments: total_comments as u64,
            boards: boards as u64,
            authors: authors as u64,
            newest_article,
            oldest_article,
        })
    }
}

impl ArticleQueries for SqliteStorage {
    fn get_article(&self, board: &str, article_id: &str) -> StorageResult<Option<Article>> {
        self.query_article(
            &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE board = ?1 AND article_id = ?2"),
            params![board, article_id],
        )
    }

    fn get_article_by_url(&self, url: &str) -> StorageResult<Option<Article>> {
        self.query_article(
            &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = ?1"),
            params![url],
        )
    }

    fn articles_by_author(&self, author: &str) -> StorageResult<Vec<Article>> {
        self.query_articles(
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles WHERE author = ?1 ORDER BY created_at DESC"
            ),
            params![author],
        )
    }

    fn list_articles(
        &self,
        board: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<Article>> {
        // SQLite treats a negative limit as no limit
        let limit = limit.map_or(-1, |limit| limit as i64);
        self.query_articles(
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles
                 WHERE (?1 IS NULL OR board = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3"
            ),
            params![board, limit, offset as i64],
        )
    }

    fn search_articles(&self, keyword: &str) -> StorageResult<Vec<Article>> {
        self.query_articles(
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles
                 WHERE instr(lower(title), lower(?1)) > 0 OR instr(lower(body), lower(?1)) > 0
                 ORDER BY created_at DESC"
            ),
            params![keyword],
        )
    }

    fn delete_article(&mut self, board: &str, article_id: &str) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM articles WHERE board = ?1 AND article_id = ?2",
            params![board, article_id],
        )?;
        Ok(deleted > 0)
    }

    fn known_identifiers(&self, board: &str) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT article_id FROM articles WHERE board = ?1")?;
        let ids = stmt
            .query_map(params![board], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }
}

impl RunLog for SqliteStorage {
    fn begin_run(&mut self, board: &str, keyword: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (board, keyword, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![board, keyword, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, summary: &CrawlSummary) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, fetched = ?3, skipped = ?4,
                    failed = ?5, pages_visited = ?6, error_message = ?7
             WHERE id = ?8",
            params![
                now,
                RunStatus::Finished(summary.stop_reason).to_db_string(),
                summary.fetched(),
                summary.skipped(),
                summary.failed(),
                summary.counters.pages_visited,
                summary.fatal.as_ref().map(|e| e.to_string()),
                run_id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![run_id],
                read_run_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                [],
                read_run_row,
            )
            .optional()?;
        Ok(run)
    }
}

struct ArticleRow {
    row_id: i64,
    board: String,
    article_id: String,
    title: String,
    author: Option<String>,
    body: String,
    created_at: String,
    url: String,
}

fn read_article_row(row: &Row<'_>) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        row_id: row.get(0)?,
        board: row.get(1)?,
        article_id: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        body: row.get(5)?,
        created_at: row.get(6)?,
        url: row.get(7)?,
    })
}

fn read_run_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        board: row.get(1)?,
        keyword: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Running),
        fetched: row.get(7)?,
        skipped: row.get(8)?,
        failed: row.get(9)?,
        pages_visited: row.get(10)?,
        error_message: row.get(11)?,
    })
}

fn format_db_datetime(value: NaiveDateTime) -> String {
    value.format(DB_DATETIME_FORMAT).to_string()
}

fn parse_db_datetime(value: &str) -> StorageResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DB_DATETIME_FORMAT)
        .map_err(|e| StorageError::Serialization(format!("bad timestamp {value:?}: {e}")))
}

fn article_row_id(conn: &Connection, board: &str, article_id: &str) -> StorageResult<Option<i64>> {
    let row_id = conn
        .query_row(
            "SELECT id FROM articles WHERE board = ?1 AND article_id = ?2",
            params![board, article_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row_id)
}

/// Upserts the article row and returns its row id
fn write_article(conn: &Connection, article: &Article, now: &str) -> StorageResult<i64> {
    let row_id = conn.query_row(
        "INSERT INTO articles
            (board, article_id, url, title, author, body, created_at, scraped_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(board, article_id) DO UPDATE SET
            url = excluded.url,
            title = excluded.title,
            author = excluded.author,
            body = excluded.body,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
         RETURNING id",
        params![
            article.board,
            article.id,
            article.url,
            article.title,
            article.author,
            article.body,
            format_db_datetime(article.created_at),
            now,
        ],
        |row| row.get(0),
    )?;
    Ok(row_id)
}

/// Upserts pushes keyed on (article row, position)
fn write_comments(
    conn: &Connection,
    row_id: i64,
    comments: &[Comment],
    now: &str,
) -> StorageResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO comments
            (article_row, position, author, body, reaction, ip, created_at, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(article_row, position) DO UPDATE SET
            author = excluded.author,
            body = excluded.body,
            reaction = excluded.reaction,
            ip = excluded.ip,
            created_at = excluded.created_at",
    )?;
    for comment in comments {
        stmt.execute(params![
            row_id,
            comment.position,
            comment.author,
            comment.body,
            comment.reaction.to_db_string(),
            comment.ip,
            format_db_datetime(comment.created_at),
            now,
        ])?;
    }
    Ok(())
}
