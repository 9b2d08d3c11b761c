//! Market-data session configuration.

use std::time::Duration;

use crate::ws::error::WsError;

/// Default market-data push host.
pub const DEFAULT_QUOTE_HOST_WS: &str = "wss://1token.trade/api/v1/ws/tick";

/// Default ping interval in seconds.
pub const DEFAULT_QUOTE_HEARTBEAT_SECS: u64 = 5;

/// Silence after which the connection counts as lost, in seconds.
pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 20;

/// Default wait for the `auth` reply in seconds.
pub const DEFAULT_QUOTE_AUTH_TIMEOUT_SECS: u64 = 5;

/// First reconnect delay in seconds.
pub const DEFAULT_QUOTE_RECONNECT_SECS: u64 = 2;

/// Maximum reconnect delay in seconds.
pub const MAX_QUOTE_RECONNECT_SECS: u64 = 64;

/// Default socket connect timeout in seconds.
pub const DEFAULT_QUOTE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Market-data session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteConfig {
    /// Market-data push URL.
    pub quote_host_ws: String,

    /// Interval between pings while ready.
    pub heartbeat_interval: Duration,

    /// Silence after which the connection counts as lost.
    pub pong_timeout: Duration,

    /// Time to wait for the `auth` reply.
    pub auth_timeout: Duration,

    /// First reconnect delay; doubles up to `max_reconnect_delay`.
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Socket connect timeout.
    pub connect_timeout: Duration,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            quote_host_ws: DEFAULT_QUOTE_HOST_WS.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_QUOTE_HEARTBEAT_SECS),
            pong_timeout: Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS),
            auth_timeout: Duration::from_secs(DEFAULT_QUOTE_AUTH_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_QUOTE_RECONNECT_SECS),
            max_reconnect_delay: Duration::from_secs(MAX_QUOTE_RECONNECT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_QUOTE_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl QuoteConfig {
    /// Creates a configuration for the given push URL.
    #[must_use]
    pub fn new(quote_host_ws: impl Into<String>) -> Self {
        Self {
            quote_host_ws: quote_host_ws.into(),
            ..Default::default()
        }
    }

    /// Sets the ping interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the silence after which the connection counts as lost.
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Sets the wait for the `auth` reply.
    #[must_use]
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Sets the first reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the socket connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if !self.quote_host_ws.starts_with("ws://") && !self.quote_host_ws.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "quote_host_ws must start with ws:// or wss://".to_string(),
            ));
        }

        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("pong_timeout", self.pong_timeout),
            ("auth_timeout", self.auth_timeout),
            ("reconnect_delay", self.reconnect_delay),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(WsError::InvalidConfig(format!("{} cannot be zero", name)));
            }
        }

        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be at least the reconnect delay".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = QuoteConfig::default();
        assert_eq!(config.quote_host_ws, DEFAULT_QUOTE_HOST_WS);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.pong_timeout, Duration::from_secs(20));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(64));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        assert!(QuoteConfig::new("http://example.com").validate().is_err());
        assert!(QuoteConfig::default()
            .with_pong_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(QuoteConfig::default()
            .with_reconnect_delay(Duration::from_secs(8))
            .with_max_reconnect_delay(Duration::from_secs(4))
            .validate()
            .is_err());
        assert!(QuoteConfig::new("ws://127.0.0.1:1")
            .with_reconnect_delay(Duration::from_millis(100))
            .validate()
            .is_ok());
    }
}
