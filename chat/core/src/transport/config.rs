//! Transport Configuration
//!
//! Settings for the HTTP transport to the agent API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default agent API address
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// HTTP transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// Base URL of the agent API, without trailing slash
    pub base_url: String,

    /// Per-request timeout in milliseconds
    ///
    /// Agents can take a long time to answer; the default is generous.
    pub request_timeout_ms: u64,

    /// Probe `GET /health/` when connecting
    pub health_check_on_connect: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 120_000,
            health_check_on_connect: true,
        }
    }
}

impl HttpTransportConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Self::default()
        }
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Enable or disable the health probe
    #[must_use]
    pub fn with_health_check(mut self, enabled: bool) -> Self {
        self.health_check_on_connect = enabled;
        self
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Strip trailing slashes so paths can be appended with `format!`
#[must_use]
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
