use crate::config::types::{
    Config, MirrorConfig, ReconcileConfig, RemoteConfig, RetryConfig, ScanConfig,
};
use crate::url::parse_http_url;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_mirror_config(&config.mirror)?;
    validate_remote_config(&config.remote)?;
    validate_retry_config(&config.retry)?;
    validate_scan_config(&config.scan)?;
    validate_reconcile_config(&config.reconcile)?;
    Ok(())
}

/// Validates local mirror configuration
fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    if config.media_root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "media_root must be set (config file or --media)".to_string(),
        ));
    }

    if config.max_concurrent_fetches < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be >= 1, got {}",
            config.max_concurrent_fetches
        )));
    }

    Ok(())
}

/// Validates remote source configuration
fn validate_remote_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    if let Some(start_url) = &config.start_url {
        parse_http_url(start_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start_url: {}", e)))?;
    }

    if config.start_url.is_none() && config.pool.is_empty() {
        return Err(ConfigError::Validation(
            "Either start_url or a non-empty pool is required".to_string(),
        ));
    }

    for member in &config.pool {
        let url = parse_http_url(member).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid pool member '{}': {}", member, e))
        })?;

        if url.path() != "/" {
            return Err(ConfigError::Validation(format!(
                "Pool member '{}' must be a tree root",
                member
            )));
        }
    }

    if config.categories.is_empty() {
        return Err(ConfigError::Validation(
            "At least one category is required".to_string(),
        ));
    }

    for category in &config.categories {
        validate_category(category)?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.listing_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "listing_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a category directory name
fn validate_category(category: &str) -> Result<(), ConfigError> {
    if category.trim_matches('/').is_empty() {
        return Err(ConfigError::Validation(
            "Category cannot be empty".to_string(),
        ));
    }

    if !category.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "Category '{}' must end with '/'",
            category
        )));
    }

    if category.split('/').any(|segment| segment == "..") {
        return Err(ConfigError::Validation(format!(
            "Category '{}' cannot contain '..'",
            category
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.download_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "download-attempts must be >= 1, got {}",
            config.download_attempts
        )));
    }

    Ok(())
}

/// Validates baseline scan configuration
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    for extension in &config.excluded_extensions {
        if !extension.starts_with('.') || extension.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "Excluded extension '{}' must start with '.'",
                extension
            )));
        }
    }

    Ok(())
}

/// Validates reconciliation configuration
fn validate_reconcile_config(config: &ReconcileConfig) -> Result<(), ConfigError> {
    if config.gap_threshold < 1 {
        return Err(ConfigError::Validation(
            "gap_threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}
