//! Configuration validation
//!
//! Catches configurations that would make the run misbehave quietly:
//! an empty credential pool, a zero page size, inverted delay ranges.

use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let base = Url::parse(&config.site.base_url)
        .map_err(|_| ConfigError::InvalidUrl(config.site.base_url.clone()))?;
    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(config.site.base_url.clone()));
    }

    if config.pool.credentials.is_empty() {
        return Err(ConfigError::Validation(
            "pool.credentials must list at least one identity".to_string(),
        ));
    }
    if config.pool.error_threshold == 0 {
        return Err(ConfigError::Validation(
            "pool.error-threshold must be at least 1".to_string(),
        ));
    }
    for entry in &config.pool.credentials {
        if entry.handle.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credential handle must not be empty".to_string(),
            ));
        }
    }

    if config.fetch.page_size == 0 {
        return Err(ConfigError::Validation(
            "fetch.page-size must be at least 1".to_string(),
        ));
    }
    if config.fetch.max_pages == 0 {
        return Err(ConfigError::Validation(
            "fetch.max-pages must be at least 1".to_string(),
        ));
    }
    if config.fetch.page_delay_min_ms > config.fetch.page_delay_max_ms {
        return Err(ConfigError::Validation(
            "fetch.page-delay-min-ms exceeds fetch.page-delay-max-ms".to_string(),
        ));
    }

    if config.batch.checkpoint_interval == 0 {
        return Err(ConfigError::Validation(
            "batch.checkpoint-interval must be at least 1".to_string(),
        ));
    }
    if config.batch.entity_delay_min_ms > config.batch.entity_delay_max_ms {
        return Err(ConfigError::Validation(
            "batch.entity-delay-min-ms exceeds batch.entity-delay-max-ms".to_string(),
        ));
    }

    if config.auth.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "auth.poll-interval-secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}
