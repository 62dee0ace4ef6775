use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://www.ptt.cc";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Main configuration structure for bbs-harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of article fetches in flight at once
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Timeout applied to every single fetch (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Only articles newer than midnight `cutoff-days` days ago are kept
    #[serde(rename = "cutoff-days")]
    pub cutoff_days: u32,

    /// Stop after this many articles have been persisted
    #[serde(rename = "max-articles")]
    pub max_articles: Option<u32>,

    /// Re-fetch articles that are already stored so their pushes get refreshed
    #[serde(rename = "refresh-known")]
    pub refresh_known: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            request_timeout_secs: 30,
            cutoff_days: 5,
            max_articles: None,
            refresh_known: false,
        }
    }
}

/// Where and how the board is reached
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Site root, e.g. `https://www.ptt.cc`
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// WHATWG label of the encoding used when a page is not valid UTF-8
    #[serde(rename = "fallback-encoding")]
    pub fallback_encoding: String,

    /// Send the `over18=1` cookie that unlocks age-gated boards
    #[serde(rename = "adult-consent")]
    pub adult_consent: bool,

    /// Offset of the board's local time from UTC, in minutes
    #[serde(rename = "utc-offset-minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fallback_encoding: "utf-8".to_string(),
            adult_consent: true,
            utc_offset_minutes: 8 * 60,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./bbs_harvest.db".to_string(),
        }
    }
}
