//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlSession`: Counters, dedup set and limits of one crawl session
//! - `CrawlSummary`: What a finished session reports
//! - `StopReason`: Why a session ended
//! - `WalkerState`: Where the pagination walker is in the board's history

mod session;
mod walker_state;

// Re-export main types
pub use session::{CrawlCounters, CrawlSession, CrawlSummary, StopReason};
pub use walker_state::WalkerState;
