//! TOML Configuration File Support
//!
//! Centralized configuration loading for the chat client, with an optional
//! TOML file at `~/.config/agent-chat/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! request_timeout_ms = 120000
//! health_check_on_connect = true
//!
//! [session]
//! preview_chars = 100
//! reply_timeout_ms = 60000
//! default_agent = "general"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::SessionConfig;
use crate::transport::config::normalize_base_url;
use crate::transport::HttpTransportConfig;

/// Agent a session opens with when none is given
pub const DEFAULT_AGENT: &str = "general";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Base URL of the agent service
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Whether connecting probes the health endpoint
    pub health_check_on_connect: Option<bool>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Characters kept in log previews
    pub preview_chars: Option<usize>,

    /// Reply timeout in milliseconds (0 disables it)
    pub reply_timeout_ms: Option<u64>,

    /// Agent used when none is given on the command line
    pub default_agent: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// API configuration section
    pub api: ApiToml,

    /// Session configuration section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
///
/// Use [`load_config`] to build one with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP transport configuration
    pub api: HttpTransportConfig,

    /// Session controller configuration
    pub session: SessionConfig,

    /// Agent used when none is given
    pub default_agent: String,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: HttpTransportConfig::default(),
            session: SessionConfig::default(),
            default_agent: DEFAULT_AGENT.to_string(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the client cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty or non-HTTP base
    /// URL, a zero preview length, a zero request timeout or an empty
    /// default agent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.api.base_url;
        if url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url must not be empty".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must start with http:// or https:// (got {url})"
            )));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "api.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.session.preview_chars == 0 {
            return Err(ConfigError::ValidationError(
                "session.preview_chars must be greater than zero".to_string(),
            ));
        }
        if self.default_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.default_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/agent-chat/client.toml` or
/// `~/.config/agent-chat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agent-chat").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged configuration is invalid. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// If `path` is `None`, only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the merged configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn reply_timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.api.base_url {
        config.api.base_url = normalize_base_url(url);
    }
    if let Some(timeout) = toml.api.request_timeout_ms {
        config.api.request_timeout_ms = timeout;
    }
    if let Some(enabled) = toml.api.health_check_on_connect {
        config.api.health_check_on_connect = enabled;
    }

    if let Some(chars) = toml.session.preview_chars {
        config.session.preview_chars = chars;
    }
    if let Some(ms) = toml.session.reply_timeout_ms {
        config.session.reply_timeout = reply_timeout_from_ms(ms);
    }
    if let Some(ref agent) = toml.session.default_agent {
        config.default_agent = agent.clone();
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("AGENT_CHAT_API_URL") {
        config.api.base_url = normalize_base_url(&url);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("AGENT_CHAT_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.api.request_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(enabled) = env("AGENT_CHAT_HEALTH_CHECK") {
        config.api.health_check_on_connect = parse_flag(&enabled);
        config.source = ConfigSource::Env;
    }
    if let Some(chars) = env("AGENT_CHAT_PREVIEW_CHARS") {
        if let Ok(n) = chars.parse::<usize>() {
            config.session.preview_chars = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(timeout) = env("AGENT_CHAT_REPLY_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.session.reply_timeout = reply_timeout_from_ms(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(agent) = env("AGENT_CHAT_DEFAULT_AGENT") {
        config.default_agent = agent;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API base URL override
    pub base_url: Option<String>,

    /// Reply timeout override (milliseconds, 0 disables)
    pub reply_timeout_ms: Option<u64>,

    /// Default agent override
    pub default_agent: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the reply timeout
    #[must_use]
    pub fn with_reply_timeout_ms(mut self, ms: u64) -> Self {
        self.reply_timeout_ms = Some(ms);
        self
    }

    /// Override the default agent
    #[must_use]
    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Self {
        self.default_agent = Some(agent.into());
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none() && self.reply_timeout_ms.is_none() && self.default_agent.is_none()
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the result is invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.api.base_url = normalize_base_url(url);
        }
        if let Some(ms) = self.reply_timeout_ms {
            config.session.reply_timeout = reply_timeout_from_ms(ms);
        }
        if let Some(ref agent) = self.default_agent {
            config.default_agent = agent.clone();
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
