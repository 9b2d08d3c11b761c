//! Push session configuration.
//!
//! Every session uses the same timing policy; the defaults below are the
//! values the service expects and should rarely need changing.

use std::time::Duration;

use super::error::WsError;

/// Default push host.
pub const DEFAULT_TRADE_HOST_WS: &str = "wss://1token.trade/api/v1/ws/trade";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;

/// Default wait for the connection acknowledgement in seconds.
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 5;

/// Default (and minimum) reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 1;

/// Maximum reconnect delay in seconds.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Default socket connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Idle time after which a drained order queue is dropped, in seconds.
pub const DEFAULT_ORDER_QUEUE_IDLE_SECS: u64 = 10;

/// Interval of the order queue sweep, in seconds.
pub const DEFAULT_ORDER_QUEUE_SWEEP_SECS: u64 = 2;

/// Maximum number of pending updates kept per order queue.
pub const DEFAULT_ORDER_QUEUE_CAPACITY: usize = 1024;

/// Push session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    /// Push host; the session connects to `{trade_host_ws}/{exchange}/{account}`.
    pub trade_host_ws: String,

    /// Interval between pings while ready.
    pub heartbeat_interval: Duration,

    /// Time to wait for the connection acknowledgement.
    pub auth_timeout: Duration,

    /// Initial reconnect delay. Never below one second.
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Socket connect timeout.
    pub connect_timeout: Duration,

    /// Idle time after which a drained order queue is dropped.
    pub order_queue_idle_timeout: Duration,

    /// Interval of the order queue sweep.
    pub order_queue_sweep_interval: Duration,

    /// Maximum pending updates per order queue; the oldest is dropped first.
    pub order_queue_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            trade_host_ws: DEFAULT_TRADE_HOST_WS.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_delay: Duration::from_secs(MAX_RECONNECT_DELAY_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            order_queue_idle_timeout: Duration::from_secs(DEFAULT_ORDER_QUEUE_IDLE_SECS),
            order_queue_sweep_interval: Duration::from_secs(DEFAULT_ORDER_QUEUE_SWEEP_SECS),
            order_queue_capacity: DEFAULT_ORDER_QUEUE_CAPACITY,
        }
    }
}

impl WsConfig {
    /// Creates a configuration for the given push host.
    #[must_use]
    pub fn new(trade_host_ws: impl Into<String>) -> Self {
        Self {
            trade_host_ws: trade_host_ws.into(),
            ..Default::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the acknowledgement timeout.
    #[must_use]
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Sets the initial reconnect delay.
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

    /// Sets the idle timeout of drained order queues.
    #[must_use]
    pub fn with_order_queue_idle_timeout(mut self, timeout: Duration) -> Self {
        self.order_queue_idle_timeout = timeout;
        self
    }

    /// Sets the order queue sweep interval.
    #[must_use]
    pub fn with_order_queue_sweep_interval(mut self, interval: Duration) -> Self {
        self.order_queue_sweep_interval = interval;
        self
    }

    /// Sets the per-order queue capacity.
    #[must_use]
    pub fn with_order_queue_capacity(mut self, capacity: usize) -> Self {
        self.order_queue_capacity = capacity;
        self
    }

    /// Returns the host with any trailing `/` removed.
    #[must_use]
    pub fn host(&self) -> &str {
        self.trade_host_ws.trim_end_matches('/')
    }

    /// Returns the session URL for an account.
    #[must_use]
    pub fn session_url(&self, exchange: &str, account: &str) -> String {
        format!("{}/{}/{}", self.host(), exchange, account)
    }

    /// Returns the first reconnect delay, clamped to at least one second.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        self.reconnect_delay
            .max(Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.trade_host_ws.is_empty() {
            return Err(WsError::InvalidConfig(
                "trade_host_ws cannot be empty".to_string(),
            ));
        }

        if !self.trade_host_ws.starts_with("ws://") && !self.trade_host_ws.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "trade_host_ws must start with ws:// or wss://".to_string(),
            ));
        }

        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("auth_timeout", self.auth_timeout),
            ("connect_timeout", self.connect_timeout),
            ("order_queue_sweep_interval", self.order_queue_sweep_interval),
        ] {
            if value.is_zero() {
                return Err(WsError::InvalidConfig(format!("{} cannot be zero", name)));
            }
        }

        if self.max_reconnect_delay < self.initial_backoff() {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be at least the reconnect delay".to_string(),
            ));
        }

        if self.order_queue_capacity == 0 {
            return Err(WsError::InvalidConfig(
                "order_queue_capacity cannot be zero".to_string(),
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
        let config = WsConfig::default();
        assert_eq!(config.trade_host_ws, DEFAULT_TRADE_HOST_WS);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.auth_timeout, Duration::from_secs(5));
        assert_eq!(config.order_queue_idle_timeout, Duration::from_secs(10));
        assert_eq!(config.order_queue_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("ws://127.0.0.1:9000/")
            .with_heartbeat_interval(Duration::from_secs(3))
            .with_auth_timeout(Duration::from_secs(2))
            .with_reconnect_delay(Duration::from_secs(2))
            .with_max_reconnect_delay(Duration::from_secs(8))
            .with_connect_timeout(Duration::from_secs(1))
            .with_order_queue_idle_timeout(Duration::from_secs(4))
            .with_order_queue_sweep_interval(Duration::from_millis(500))
            .with_order_queue_capacity(16);

        assert_eq!(config.heartbeat_interval, Duration::from_secs(3));
        assert_eq!(config.auth_timeout, Duration::from_secs(2));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(8));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.order_queue_idle_timeout, Duration::from_secs(4));
        assert_eq!(config.order_queue_sweep_interval, Duration::from_millis(500));
        assert_eq!(config.order_queue_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_url() {
        let config = WsConfig::new("wss://example.com/ws/trade/");
        assert_eq!(
            config.session_url("binance", "otplay"),
            "wss://example.com/ws/trade/binance/otplay"
        );
    }

    #[test]
    fn test_initial_backoff_has_floor() {
        let config = WsConfig::default().with_reconnect_delay(Duration::from_millis(10));
        assert_eq!(config.initial_backoff(), Duration::from_secs(1));

        let config = WsConfig::default().with_reconnect_delay(Duration::from_secs(3));
        assert_eq!(config.initial_backoff(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_validate_bad_scheme() {
        let config = WsConfig::new("https://example.com/ws");
        assert!(matches!(config.validate(), Err(WsError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_validate_empty() {
        assert!(WsConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_heartbeat() {
        let config = WsConfig::default().with_heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_backoff_order() {
        let config = WsConfig::default()
            .with_reconnect_delay(Duration::from_secs(10))
            .with_max_reconnect_delay(Duration::from_secs(5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_capacity() {
        let config = WsConfig::default().with_order_queue_capacity(0);
        assert!(config.validate().is_err());
    }
}
