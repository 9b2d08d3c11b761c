//! Client configuration.
//!
//! Provides configuration options for the REST client.

use std::time::Duration;

/// Default base URL of the trade API.
pub const DEFAULT_TRADE_HOST: &str = "https://1token.trade/api/v1/trade";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the trade API; account paths are appended to it.
    pub trade_host: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            trade_host: DEFAULT_TRADE_HOST.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("onetoken-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with the given trade host.
    #[must_use]
    pub fn new(trade_host: impl Into<String>) -> Self {
        Self {
            trade_host: trade_host.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the trade host without a trailing slash.
    #[must_use]
    pub fn host(&self) -> &str {
        self.trade_host.trim_end_matches('/')
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), super::error::ClientError> {
        if self.trade_host.is_empty() {
            return Err(super::error::ClientError::InvalidConfig(
                "trade_host cannot be empty".to_string(),
            ));
        }

        if !self.trade_host.starts_with("http://") && !self.trade_host.starts_with("https://") {
            return Err(super::error::ClientError::InvalidConfig(
                "trade_host must start with http:// or https://".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(super::error::ClientError::InvalidConfig(
                "timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
