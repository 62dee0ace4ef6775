use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use encoding_rs::Encoding;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Looks up the fallback encoding by its WHATWG label
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::InvalidEncoding(label.to_string()))
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_articles == Some(0) {
        return Err(ConfigError::Validation(
            "max_articles must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    resolve_encoding(&config.fallback_encoding)?;

    // Real-world offsets stay within UTC-12..UTC+14
    if !(-12 * 60..=14 * 60).contains(&config.utc_offset_minutes) {
        return Err(ConfigError::Validation(format!(
            "utc_offset_minutes out of range: {}",
            config.utc_offset_minutes
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
