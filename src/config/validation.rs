use crate::config::types::{ClassifierConfig, ClientConfig, Config, CrawlConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_storage_config(&config.storage)?;
    validate_crawl_config(&config.crawl)?;
    validate_classifier_config(&config.classifier)?;
    Ok(())
}

/// Validates upstream client configuration
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_http_url("client.base-url", &config.base_url)?;

    if !(1..=3).contains(&config.vehicle_type) {
        return Err(ConfigError::Validation(format!(
            "vehicle-type must be 1, 2 or 3, got {}",
            config.vehicle_type
        )));
    }

    if config.base_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "base-interval-ms must be >= 1ms".to_string(),
        ));
    }

    if config.max_interval_ms < config.base_interval_ms {
        return Err(ConfigError::Validation(format!(
            "max-interval-ms ({}ms) must be >= base-interval-ms ({}ms)",
            config.max_interval_ms, config.base_interval_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the brand allow-list
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    for code in &config.allowed_brands {
        if code.trim().is_empty() {
            return Err(ConfigError::Validation(
                "allowed-brands cannot contain empty codes".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates classifier configuration
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    validate_http_url("classifier.base-url", &config.base_url)?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "classifier model cannot be empty".to_string(),
        ));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api-key-env cannot be empty".to_string(),
        ));
    }

    if config.batch_size < 1 || config.batch_size > 100 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be between 1 and 100, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

/// Validates that a URL parses and uses http or https
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field,
            url.scheme()
        )));
    }

    Ok(())
}
