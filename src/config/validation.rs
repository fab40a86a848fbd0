//! Configuration validation
//!
//! Validates the service configuration for correctness:
//! - Provider API URLs are http(s)
//! - Page lengths are within what both providers accept
//! - Timeouts and concurrency limits are non-zero

use super::service_config::{ProviderConfig, ServiceConfig};
use crate::AggregatorError;

/// Largest page either provider will hand back
const MAX_PAGE_LEN: u32 = 100;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a service configuration, collecting every problem found
pub fn validate_config(config: &ServiceConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.server.bind.trim().is_empty() {
        errors.push(ValidationError::new(
            "server.bind",
            "Bind address cannot be empty",
        ));
    }

    if config.server.request_deadline_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_deadline_secs",
            "Request deadline must be greater than 0",
        ));
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "http.request_timeout_secs",
            "Request timeout must be greater than 0",
        ));
    }

    if config.http.max_concurrent_requests == 0 {
        errors.push(ValidationError::new(
            "http.max_concurrent_requests",
            "At least one concurrent request must be allowed",
        ));
    }

    validate_provider("github", &config.github, &mut errors);
    validate_provider("bitbucket", &config.bitbucket, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_provider(name: &str, provider: &ProviderConfig, errors: &mut Vec<ValidationError>) {
    if !provider.api_url.starts_with("http://") && !provider.api_url.starts_with("https://") {
        errors.push(ValidationError::new(
            format!("{}.api_url", name),
            format!("Invalid API URL: {}", provider.api_url),
        ));
    }

    if provider.page_len == 0 || provider.page_len > MAX_PAGE_LEN {
        errors.push(ValidationError::new(
            format!("{}.page_len", name),
            format!(
                "Page length {} must be between 1 and {}",
                provider.page_len, MAX_PAGE_LEN
            ),
        ));
    }
}

/// Validate and convert the collected errors into a single [`AggregatorError::Config`]
pub fn validate_config_result(config: &ServiceConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        AggregatorError::Config(format!(
            "Invalid configuration:\n  {}",
            messages.join("\n  ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::new()).is_ok());
    }

    #[test]
    fn test_invalid_api_url() {
        let mut config = ServiceConfig::new();
        config.github.api_url = "ftp://api.github.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "github.api_url");
    }

    #[test]
    fn test_page_len_bounds() {
        let mut config = ServiceConfig::new();
        config.github.page_len = 0;
        config.bitbucket.page_len = 101;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["github.page_len", "bitbucket.page_len"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::new();
        config.server.bind = String::new();
        config.server.request_deadline_secs = 0;
        config.http.request_timeout_secs = 0;
        config.http.max_concurrent_requests = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_validate_config_result_message() {
        let mut config = ServiceConfig::new();
        config.bitbucket.api_url = "bitbucket.org".to_string();

        let err = validate_config_result(&config).unwrap_err();
        assert!(err.to_string().contains("bitbucket.api_url"));
    }
}
