//! Output module for reporting crawl results
//!
//! This module handles:
//! - Printing crawl summaries and database statistics
//! - Exporting stored articles as JSON

mod export;
pub mod stats;

pub use export::{export_articles, ArticleExport, ArticleRecord, CommentRecord, ExportMetadata};
pub use stats::{database_size_mb, print_statistics, print_summary};
