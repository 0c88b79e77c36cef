//! Configuration management for cursekit
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use cursekit::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("API at: {}{}", config.api.base_url, config.api.extra);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CURSEKIT__<section>__<key>`
//!
//! Examples:
//! - `CURSEKIT__API__BASE_URL=http://localhost:8080/`
//! - `CURSEKIT__HTTP__MAX_RETRIES=5`
//! - `CURSEKIT__FORMATTING__DESCRIPTION=none`
//! - `CURSEKIT__API__BACKEND=cursetools`
//!
//! The API key is only ever read from `CURSEFORGE_API_KEY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/cursekit.toml`.
//! This can be overridden using the `CURSEKIT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    ApiConfig, Backend, Config, DescriptionFormat, FormattingConfig, HttpConfig, LoggingConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`CURSEKIT__*`)
    /// 2. TOML file (default: `config/cursekit.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, still applying environment
    /// overrides and secrets
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(Some(path))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Check the configuration without loading anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// Effective configuration as TOML; the API key is never included
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
