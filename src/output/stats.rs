//! Statistics display
//!
//! This module prints database totals and crawl summaries to stdout.

use crate::state::CrawlSummary;
use crate::storage::{RunRecord, StorageStats};
use std::path::Path;

/// Size of the database file in megabytes, if it exists
pub fn database_size_mb(path: &Path) -> Option<f64> {
    std::fs::metadata(path)
        .ok()
        .map(|meta| meta.len() as f64 / (1024.0 * 1024.0))
}

/// Prints database statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `db_path` - The database file, for its size
/// * `latest_run` - The most recent run, if any
pub fn print_statistics(stats: &StorageStats, db_path: &Path, latest_run: Option<&RunRecord>) {
    println!("=== Database Statistics ===\n");

    println!("Overview:");
    println!("  Articles: {}", stats.total_articles);
    println!("  Comments: {}", stats.total_comments);
    println!("  Boards: {}", stats.boards);
    println!("  Authors: {}", stats.authors);
    if let (Some(oldest), Some(newest)) = (&stats.oldest_article, &stats.newest_article) {
        println!("  Articles span: {} .. {}", oldest, newest);
    }
    match database_size_mb(db_path) {
        Some(size) => println!("  Database size: {:.2} MB ({})", size, db_path.display()),
        None => println!("  Database file: {} (missing)", db_path.display()),
    }
    println!();

    if let Some(run) = latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Board: {}", run.board);
        if !run.keyword.is_empty() {
            println!("  Keyword: {}", run.keyword);
        }
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status.to_db_string());
        println!(
            "  Fetched {} / skipped {} / failed {} over {} pages",
            run.fetched, run.skipped, run.failed, run.pages_visited
        );
        if let Some(error) = &run.error_message {
            println!("  Error: {}", error);
        }
    }
}

/// Prints the result of a crawl session
pub fn print_summary(summary: &CrawlSummary) {
    let counters = &summary.counters;

    println!("=== Crawl Summary ===\n");
    println!("Board: {}", summary.board);
    if !summary.keyword.is_empty() {
        println!("Keyword: {}", summary.keyword);
    }
    println!("Stopped: {}", summary.stop_reason);
    println!();
    println!("  Listing pages visited: {}", counters.pages_visited);
    println!("  Articles saved: {}", counters.fetched);
    println!("  Skipped (already stored): {}", counters.skipped_duplicate);
    println!("  Skipped (keyword): {}", counters.skipped_filtered);
    println!("  Skipped (older than cutoff): {}", counters.skipped_cutoff);
    println!("  Failed: {}", counters.failed);
    if counters.dropped + counters.discarded > 0 {
        println!(
            "  Not processed (session closing): {}",
            counters.dropped + counters.discarded
        );
    }

    if let Some(error) = &summary.fatal {
        println!();
        println!("Crawl stopped by a storage failure: {}", error);
    }
}
