use super::models::Config;
use thiserror::Error;

/// Upper bound for `http.max_retries`; backoff doubles on every attempt
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("API path prefix '{extra}' must end with '/'")]
    InvalidExtraPath { extra: String },

    #[error("HTTP timeout must be positive: {field} = 0")]
    InvalidTimeout { field: String },

    #[error("app_name must be a non-empty single line")]
    InvalidAppName,

    #[error("max_retries must be between 1 and 10, got {0}")]
    InvalidMaxRetries(u32),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api(config)?;
    validate_http(config)?;
    Ok(())
}

/// Base URL must be absolute http(s) and end with a slash so that
/// `base_url + extra + path` always forms a valid URL
fn validate_api(config: &Config) -> Result<(), ValidationError> {
    let url = &config.api.base_url;

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ValidationError::InvalidBaseUrl {
            url: url.clone(),
            reason: "expected an http:// or https:// scheme".to_string(),
        })?;

    if rest.trim_end_matches('/').is_empty() {
        return Err(ValidationError::InvalidBaseUrl {
            url: url.clone(),
            reason: "missing host".to_string(),
        });
    }

    if !url.ends_with('/') {
        return Err(ValidationError::InvalidBaseUrl {
            url: url.clone(),
            reason: "must end with '/'".to_string(),
        });
    }

    let name = &config.api.app_name;
    if name.trim().is_empty() || name.contains(['\r', '\n']) {
        return Err(ValidationError::InvalidAppName);
    }

    let extra = &config.api.extra;
    if !extra.is_empty() && !extra.ends_with('/') {
        return Err(ValidationError::InvalidExtraPath {
            extra: extra.clone(),
        });
    }

    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.connect_timeout_secs == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: "connect_timeout_secs".to_string(),
        });
    }

    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: "request_timeout_secs".to_string(),
        });
    }

    if !(1..=MAX_RETRIES).contains(&config.http.max_retries) {
        return Err(ValidationError::InvalidMaxRetries(config.http.max_retries));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_base_url_needs_scheme() {
        let mut config = Config::default();
        config.api.base_url = "api.curseforge.com/".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_base_url_needs_trailing_slash() {
        let mut config = Config::default();
        config.api.base_url = "https://api.curseforge.com".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_base_url_needs_host() {
        let mut config = Config::default();
        config.api.base_url = "http://".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_extra_path_needs_trailing_slash() {
        let mut config = Config::default();
        config.api.extra = "v1".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidExtraPath { .. })
        ));

        config.api.extra = String::new();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_app_name_must_be_header_safe() {
        let mut config = Config::default();
        config.api.app_name = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::InvalidAppName)));

        config.api.app_name = "modpack-builder\nx".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::InvalidAppName)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.http.request_timeout_secs = 0;

        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = Config::default();
        config.http.max_retries = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_excessive_retries_rejected() {
        let mut config = Config::default();
        config.http.max_retries = MAX_RETRIES;
        assert!(validate(&config).is_ok());

        config.http.max_retries = 65;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxRetries(65))
        ));
    }
}
