//! JSON export of stored articles

use crate::model::{Article, Comment};
use crate::HarvestError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One exported article with its pushes
#[derive(Debug, Clone, Serialize)]
pub struct ArticleExport {
    pub metadata: ExportMetadata,
    pub article: ArticleRecord,
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub total_comments: usize,
    pub board: String,
    pub keyword: String,
    pub harvester_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRecord {
    pub position: u32,
    pub author: String,
    pub body: String,
    pub reaction: &'static str,
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl From<&Comment> for CommentRecord {
    fn from(comment: &Comment) -> Self {
        Self {
            position: comment.position,
            author: comment.author.clone(),
            body: comment.body.clone(),
            reaction: comment.reaction.to_db_string(),
            created_at: comment.created_at,
            ip: comment.ip.clone(),
        }
    }
}

impl ArticleExport {
    /// Builds the export record for an article
    ///
    /// `keyword` is the filter the export was made with, empty for none.
    pub fn new(article: &Article, keyword: &str, exported_at: DateTime<Utc>) -> Self {
        Self {
            metadata: ExportMetadata {
                exported_at,
                total_comments: article.comments().len(),
                board: article.board.clone(),
                keyword: keyword.to_string(),
                harvester_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            article: ArticleRecord {
                id: article.id.clone(),
                title: article.title.clone(),
                url: article.url.clone(),
                author: article.author.clone(),
                body: article.body.clone(),
                created_at: article.created_at,
            },
            comments: article.comments().iter().map(CommentRecord::from).collect(),
        }
    }
}

/// Writes articles as a pretty-printed JSON array
///
/// # Arguments
///
/// * `articles` - The articles to export
/// * `keyword` - Filter the articles were selected with, recorded in metadata
/// * `path` - Destination file, overwritten if it exists
///
/// # Returns
///
/// * `Ok(usize)` - Number of articles written
/// * `Err(HarvestError)` - Failed to create or write the file
pub fn export_articles(
    articles: &[Article],
    keyword: &str,
    path: &Path,
) -> Result<usize, HarvestError> {
    let exported_at = Utc::now();
    let records: Vec<ArticleExport> = articles
        .iter()
        .map(|article| ArticleExport::new(article, keyword, exported_at))
        .collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!("Exported {} articles to {}", records.len(), path.display());
    Ok(records.len())
}
