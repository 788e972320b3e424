//! Configuration validation

use super::*;
use crate::error::{Result, SimilarityError};
use crate::warehouse::TableRef;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_backend_config(&config.backend)?;
    validate_warehouse_config(&config.warehouse)?;
    validate_cache_config(&config.cache)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_backend_config(config: &BackendConfig) -> Result<()> {
    if let Some(url) = &config.service_url {
        if !url.is_empty() && !is_http_url(url) {
            return Err(SimilarityError::Config(
                "Similarity service URL must start with http:// or https://".to_string(),
            ));
        }
    }

    if config.service_timeout_secs == 0 {
        return Err(SimilarityError::Config(
            "Service timeout must be greater than 0".to_string(),
        ));
    }

    if config.service_timeout_secs > 300 {
        return Err(SimilarityError::Config(
            "Service timeout too large (max: 300 seconds)".to_string(),
        ));
    }

    if config.circuit_breaker_enabled && config.circuit_failure_threshold == 0 {
        return Err(SimilarityError::Config(
            "Circuit breaker failure threshold must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_warehouse_config(config: &WarehouseConfig) -> Result<()> {
    TableRef::parse(&config.table_id)?;

    if !is_http_url(&config.api_url) {
        return Err(SimilarityError::Config(
            "Warehouse API URL must start with http:// or https://".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(SimilarityError::Config(
            "Warehouse timeout must be greater than 0".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(SimilarityError::Config(
            "Max retries too large (max: 10)".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<()> {
    if config.enabled {
        if config.max_size == 0 {
            return Err(SimilarityError::Config(
                "Cache size must be greater than 0 when cache is enabled".to_string(),
            ));
        }

        if config.ttl_secs == 0 {
            return Err(SimilarityError::Config(
                "Cache TTL must be greater than 0 when cache is enabled".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.to_lowercase().as_str()) {
        return Err(SimilarityError::Config(format!(
            "Invalid log level: {} (must be one of: {})",
            config.level,
            valid_levels.join(", ")
        )));
    }

    let valid_formats = ["json", "compact", "pretty"];
    if !valid_formats.contains(&config.format.as_str()) {
        return Err(SimilarityError::Config(format!(
            "Invalid log format: {} (must be one of: {})",
            config.format,
            valid_formats.join(", ")
        )));
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
