//! Configuration module for bbs-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every table is optional; missing keys fall back to [`Config::default`].
//!
//! # Example
//!
//! ```no_run
//! use bbs_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Fetching with {} workers", config.crawler.max_concurrent_fetches);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, SourceConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_or_default};
pub use validation::{resolve_encoding, validate};
