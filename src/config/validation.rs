use crate::config::types::{
    Config, CrawlConfig, DispatcherSection, FilterEntry, OutputConfig, RateLimitSection,
    ScorerEntry, UserAgentConfig,
};
use crate::ConfigError;
use tokio::sync::Semaphore;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_dispatcher_config(&config.dispatcher)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_user_agent_config(&config.user_agent)?;
    if let Some(output) = &config.output {
        validate_output_config(output)?;
    }
    for entry in &config.filters {
        validate_filter(entry)?;
    }
    for entry in &config.scorers {
        validate_scorer(entry)?;
    }
    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }
    }

    if let Some(depth) = config.max_depth {
        if depth < 0 || depth > i64::from(u32::MAX) {
            return Err(ConfigError::Validation(format!(
                "max-depth must be between 0 and {}, got {}",
                u32::MAX,
                depth
            )));
        }
    }

    if let Some(pages) = config.max_pages {
        if pages < 1 {
            return Err(ConfigError::Validation(format!(
                "max-pages must be >= 1, got {}",
                pages
            )));
        }
    }

    if let Some(threshold) = config.score_threshold {
        check_unit_interval("score-threshold", threshold)?;
    }

    Ok(())
}

fn validate_dispatcher_config(config: &DispatcherSection) -> Result<(), ConfigError> {
    if config.max_session_permit < 1 {
        return Err(ConfigError::Validation(format!(
            "max-session-permit must be >= 1, got {}",
            config.max_session_permit
        )));
    }
    if u64::try_from(config.max_session_permit)
        .is_ok_and(|permits| permits > Semaphore::MAX_PERMITS as u64)
    {
        return Err(ConfigError::Validation(format!(
            "max-session-permit must be at most {}, got {}",
            Semaphore::MAX_PERMITS,
            config.max_session_permit
        )));
    }

    if !(config.memory_threshold_percent > 0.0 && config.memory_threshold_percent <= 100.0) {
        return Err(ConfigError::Validation(format!(
            "memory-threshold-percent must be in (0, 100], got {}",
            config.memory_threshold_percent
        )));
    }

    check_positive_seconds("check-interval", config.check_interval)?;
    check_positive_seconds("memory-wait-timeout", config.memory_wait_timeout)?;
    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitSection) -> Result<(), ConfigError> {
    let [min, max] = config.base_delay;
    check_seconds("base-delay", min)?;
    check_seconds("base-delay", max)?;
    if min > max {
        return Err(ConfigError::Validation(format!(
            "base-delay minimum ({}) exceeds maximum ({})",
            min, max
        )));
    }

    check_seconds("max-delay", config.max_delay)?;
    if config.max_delay < min {
        return Err(ConfigError::Validation(format!(
            "max-delay ({}) is below the base delay ({})",
            config.max_delay, min
        )));
    }

    if config.max_retries < 0 || config.max_retries > i64::from(u32::MAX) {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 0, got {}",
            config.max_retries
        )));
    }

    if let Some(code) = config
        .rate_limit_codes
        .iter()
        .find(|code| !(100..=599).contains(*code))
    {
        return Err(ConfigError::Validation(format!(
            "rate-limit-codes contains invalid HTTP status {}",
            code
        )));
    }

    Ok(())
}

/// Validates user agent configuration
///
/// Contact details are optional, but must be well formed when given.
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if !config.contact_url.is_empty() {
        Url::parse(&config.contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    if !config.contact_email.is_empty() {
        validate_email(&config.contact_email)?;
    }

    check_positive_seconds("request-timeout", config.request_timeout)?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_filter(entry: &FilterEntry) -> Result<(), ConfigError> {
    match entry {
        FilterEntry::UrlPattern { patterns, .. } => {
            if patterns.is_empty() {
                return Err(ConfigError::InvalidPattern(
                    "url-pattern filter needs at least one pattern".to_string(),
                ));
            }
        }
        FilterEntry::Domain { allowed, blocked } => {
            for pattern in allowed.iter().chain(blocked) {
                validate_domain_pattern(pattern)?;
            }
        }
        FilterEntry::ContentType { allowed } => {
            if allowed.iter().any(|t| !t.contains('/')) {
                return Err(ConfigError::Validation(format!(
                    "content-type filter entries must look like 'type/subtype', got {:?}",
                    allowed
                )));
            }
        }
        FilterEntry::Seo { threshold, .. } => check_unit_interval("seo threshold", *threshold)?,
        FilterEntry::ContentRelevance { threshold, .. } => {
            if !threshold.is_finite() || *threshold < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "content-relevance threshold must be >= 0, got {}",
                    threshold
                )));
            }
        }
    }
    Ok(())
}

fn validate_scorer(entry: &ScorerEntry) -> Result<(), ConfigError> {
    let weight = entry.weight();
    if !weight.is_finite() || weight < 0.0 {
        return Err(ConfigError::Validation(format!(
            "scorer weight must be >= 0, got {}",
            weight
        )));
    }

    match entry {
        ScorerEntry::Keyword { keywords, .. } => {
            if keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "keyword scorer needs at least one keyword".to_string(),
                ));
            }
        }
        ScorerEntry::PathDepth { optimal_depth, .. } => {
            if *optimal_depth < 0 {
                return Err(ConfigError::Validation(format!(
                    "optimal-depth must be >= 0, got {}",
                    optimal_depth
                )));
            }
        }
        ScorerEntry::DomainAuthority {
            weights,
            default_weight,
            ..
        } => {
            check_unit_interval("default-weight", *default_weight)?;
            for (domain, value) in weights {
                validate_domain_pattern(domain)?;
                check_unit_interval("domain weight", *value)?;
            }
        }
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_positive_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    check_seconds(name, value)?;
    if value == 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    validate_domain_string(pattern.strip_prefix("*.").unwrap_or(pattern))
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
