use crate::config::types::{
    Config, ExtractorConfig, FeedConfig, FetchConfig, OutputConfig, PacingConfig, SessionConfig,
    UserAgentConfig,
};
use crate::{ConfigError, ConfigResult};
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_feed_config(&config.feed)?;
    validate_session_config(&config.session)?;
    validate_fetch_config(&config.fetch)?;
    validate_pacing_config(&config.pacing)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

fn validate_feed_config(config: &FeedConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    validate_selector("content_marker", &config.content_marker)?;

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> ConfigResult<()> {
    validate_range(
        "scroll_pause",
        config.scroll_pause_min_ms,
        config.scroll_pause_max_ms,
    )?;
    validate_range(
        "open_retry",
        config.open_retry_min_ms,
        config.open_retry_max_ms,
    )?;

    if config.open_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "open_retries must be >= 1, got {}",
            config.open_retries
        )));
    }

    if config.wait_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "wait_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.profile_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "profile_dir cannot be empty".to_string(),
        ));
    }

    if let Some(fallback) = &config.fallback_profile_dir {
        if fallback == &config.profile_dir {
            return Err(ConfigError::Validation(
                "fallback_profile_dir must differ from profile_dir".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> ConfigResult<()> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }
    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> ConfigResult<()> {
    validate_range("delay", config.min_delay_ms, config.max_delay_ms)?;
    validate_range(
        "long_pause",
        config.long_pause_min_secs,
        config.long_pause_max_secs,
    )?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.checkpoint_path {
        return Err(ConfigError::Validation(
            "records_path and checkpoint_path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_extractor_config(config: &ExtractorConfig) -> ConfigResult<()> {
    validate_selector("comment_body", &config.comment_body)?;
    validate_selector("author", &config.author)?;
    validate_selector("timestamp", &config.timestamp)?;

    if config.card_search_depth < 1 {
        return Err(ConfigError::Validation(
            "card_search_depth must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> ConfigResult<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

fn validate_range(name: &str, min: u64, max: u64) -> ConfigResult<()> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} range is inverted: min {} > max {}",
            name, min, max
        )));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
