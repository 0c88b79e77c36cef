use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::formatters::{NullFormatter, SharedFormatter, StripHtml};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub formatting: FormattingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which service answers the built-in events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Backend {
    /// The official API, authenticated with an API key
    #[default]
    #[serde(rename = "curseforge")]
    CurseForge,
    /// The curse.tools mirror, which needs no key
    #[serde(rename = "cursetools")]
    CurseTools,
}

/// Where the CurseForge API lives
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path between the host and every endpoint, e.g. the API version
    #[serde(default = "default_extra")]
    pub extra: String,
    /// Application name sent to curse.tools as the user agent
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// API key (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: default_base_url(),
            extra: default_extra(),
            app_name: default_app_name(),
            api_key: None,
        }
    }
}

fn default_app_name() -> String {
    "cursekit".to_string()
}

fn default_base_url() -> String {
    "https://api.curseforge.com/".to_string()
}

fn default_extra() -> String {
    "v1/".to_string()
}

/// HTTP client settings shared by every URL protocol
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts per request, the first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("cursekit/{}", env!("CARGO_PKG_VERSION"))
}

/// How description text is post-processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionFormat {
    /// Raw HTML as served
    None,
    #[default]
    StripHtml,
}

impl DescriptionFormat {
    pub fn formatter(&self) -> SharedFormatter {
        match self {
            DescriptionFormat::None => Arc::new(NullFormatter),
            DescriptionFormat::StripHtml => Arc::new(StripHtml::new()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FormattingConfig {
    #[serde(default)]
    pub description: DescriptionFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "cursekit=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "https://api.curseforge.com/");
        assert_eq!(config.api.extra, "v1/");
        assert_eq!(config.api.backend, Backend::CurseForge);
        assert_eq!(config.api.app_name, "cursekit");
        assert!(config.api.api_key.is_none());
        assert_eq!(config.http.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.http.max_retries, 3);
        assert!(config.http.user_agent.starts_with("cursekit/"));
        assert_eq!(config.formatting.description, DescriptionFormat::StripHtml);
    }

    #[test]
    fn test_description_format_picks_formatter() {
        let html = "<b>bold</b>";
        assert_eq!(DescriptionFormat::None.formatter().format(html), html);
        assert_eq!(DescriptionFormat::StripHtml.formatter().format(html), "bold");
    }

    #[test]
    fn test_backend_names() {
        let config: Config = toml::from_str("[api]\nbackend = \"cursetools\"\n").unwrap();
        assert_eq!(config.api.backend, Backend::CurseTools);

        let rendered = toml::to_string(&Config::default()).unwrap();
        assert!(rendered.contains("backend = \"curseforge\""));
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut config = Config::default();
        config.api.api_key = Some("secret".to_string());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("strip_html"));
    }
}
