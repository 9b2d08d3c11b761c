//! Market-data protocol messages.
//!
//! The client authenticates with `{"uri":"auth"}`, keeps the socket alive
//! with `{"uri":"ping"}` and subscribes per contract. Updates come back as
//! `{"uri":"single-tick-verbose","data":{"contract":..}}` or
//! `{"uri":"single-candle","data":{"contract":..,"duration":..}}`, often
//! as gzip-compressed binary frames.

use std::fmt;

use serde_json::{json, Value};

use crate::ws::error::WsError;

/// Market-data channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuoteChannel {
    /// Verbose tick: last trade plus order book levels.
    Tick,
    /// Candles of one duration, e.g. `1m`.
    Candle {
        /// Candle duration.
        duration: String,
    },
}

/// One keyed market-data subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteSubscription {
    /// Contract, e.g. `huobip/btc.usdt`.
    pub contract: String,
    /// Channel.
    pub channel: QuoteChannel,
}

impl QuoteSubscription {
    /// Verbose ticks of one contract.
    #[must_use]
    pub fn tick(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            channel: QuoteChannel::Tick,
        }
    }

    /// Candles of one contract and duration.
    #[must_use]
    pub fn candle(contract: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            channel: QuoteChannel::Candle {
                duration: duration.into(),
            },
        }
    }

    /// Returns the `uri` of the subscribe request.
    #[must_use]
    pub const fn subscribe_uri(&self) -> &'static str {
        match self.channel {
            QuoteChannel::Tick => "subscribe-single-tick-verbose",
            QuoteChannel::Candle { .. } => "subscribe-single-candle",
        }
    }

    /// Returns the `uri` of the updates.
    #[must_use]
    pub const fn data_uri(&self) -> &'static str {
        match self.channel {
            QuoteChannel::Tick => "single-tick-verbose",
            QuoteChannel::Candle { .. } => "single-candle",
        }
    }

    /// Finds the subscription an update belongs to.
    fn from_update(uri: &str, data: &Value) -> Option<Self> {
        let contract = data.get("contract")?.as_str()?;
        match uri {
            "single-tick-verbose" => Some(Self::tick(contract)),
            "single-candle" => Some(Self::candle(
                contract,
                data.get("duration")?.as_str()?,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for QuoteSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel {
            QuoteChannel::Tick => write!(f, "{}:{}", self.data_uri(), self.contract),
            QuoteChannel::Candle { duration } => {
                write!(f, "{}:{}:{}", self.data_uri(), self.contract, duration)
            }
        }
    }
}

/// Client-to-server market-data frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteRequest {
    /// Authenticate the connection.
    Auth,
    /// Heartbeat ping.
    Ping,
    /// Subscribe to one channel.
    Subscribe(QuoteSubscription),
}

impl QuoteRequest {
    /// Returns the JSON frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Auth => json!({"uri": "auth"}),
            Self::Ping => json!({"uri": "ping"}),
            Self::Subscribe(subscription) => match &subscription.channel {
                QuoteChannel::Tick => json!({
                    "uri": subscription.subscribe_uri(),
                    "contract": subscription.contract,
                }),
                QuoteChannel::Candle { duration } => json!({
                    "uri": subscription.subscribe_uri(),
                    "contract": subscription.contract,
                    "duration": duration,
                }),
            },
        };
        value.to_string()
    }
}

/// A market-data update routed to its subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    /// Subscription the update belongs to.
    pub subscription: QuoteSubscription,
    /// Raw `data` payload.
    pub data: Value,
}

/// Server-to-client market-data frames, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotePush {
    /// Heartbeat reply.
    Pong,
    /// The `auth` reply.
    Auth,
    /// Reply to a subscribe request.
    SubscribeAck(Value),
    /// A keyed update.
    Update(QuoteUpdate),
    /// Anything else.
    Other(Value),
}

impl QuotePush {
    /// Classifies a decoded JSON frame. Frames without `uri` are data.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Malformed`] if the frame is not an object.
    pub fn classify(mut value: Value) -> Result<Self, WsError> {
        if !value.is_object() {
            return Err(WsError::Malformed(format!("expected object, got {}", value)));
        }
        let uri = value
            .get("uri")
            .and_then(Value::as_str)
            .unwrap_or("data")
            .to_string();

        match uri.as_str() {
            "pong" => Ok(Self::Pong),
            "auth" => Ok(Self::Auth),
            uri if uri.starts_with("subscribe-") => Ok(Self::SubscribeAck(value)),
            uri => {
                let subscription = value
                    .get("data")
                    .and_then(|data| QuoteSubscription::from_update(uri, data));
                match (subscription, value.get_mut("data")) {
                    (Some(subscription), Some(data)) => Ok(Self::Update(QuoteUpdate {
                        subscription,
                        data: data.take(),
                    })),
                    _ => Ok(Self::Other(value)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        assert_eq!(QuoteRequest::Auth.to_json(), r#"{"uri":"auth"}"#);
        assert_eq!(QuoteRequest::Ping.to_json(), r#"{"uri":"ping"}"#);

        let tick: Value = serde_json::from_str(
            &QuoteRequest::Subscribe(QuoteSubscription::tick("huobip/btc.usdt")).to_json(),
        )
        .expect("json");
        assert_eq!(
            tick,
            json!({"uri": "subscribe-single-tick-verbose", "contract": "huobip/btc.usdt"})
        );

        let candle: Value = serde_json::from_str(
            &QuoteRequest::Subscribe(QuoteSubscription::candle("binance/btc.usdt", "1m")).to_json(),
        )
        .expect("json");
        assert_eq!(
            candle,
            json!({"uri": "subscribe-single-candle", "contract": "binance/btc.usdt", "duration": "1m"})
        );
    }

    #[test]
    fn test_subscription_display() {
        assert_eq!(
            QuoteSubscription::candle("binance/btc.usdt", "5m").to_string(),
            "single-candle:binance/btc.usdt:5m"
        );
    }

    #[test]
    fn test_classify_control_frames() {
        assert_eq!(
            QuotePush::classify(json!({"uri": "pong"})).expect("pong"),
            QuotePush::Pong
        );
        assert_eq!(
            QuotePush::classify(json!({"uri": "auth", "message": "ok"})).expect("auth"),
            QuotePush::Auth
        );
        assert!(matches!(
            QuotePush::classify(json!({"uri": "subscribe-single-candle", "code": "ok"})),
            Ok(QuotePush::SubscribeAck(_))
        ));
        assert!(QuotePush::classify(json!([1])).is_err());
    }

    #[test]
    fn test_classify_updates() {
        let tick = QuotePush::classify(json!({
            "uri": "single-tick-verbose",
            "data": {"contract": "huobip/btc.usdt", "last": 100.5}
        }))
        .expect("tick");
        match tick {
            QuotePush::Update(update) => {
                assert_eq!(update.subscription, QuoteSubscription::tick("huobip/btc.usdt"));
                assert_eq!(update.data["last"], 100.5);
            }
            other => panic!("unexpected {:?}", other),
        }

        let candle = QuotePush::classify(json!({
            "uri": "single-candle",
            "data": {"contract": "binance/btc.usdt", "duration": "1m", "close": 1}
        }))
        .expect("candle");
        assert!(matches!(
            candle,
            QuotePush::Update(QuoteUpdate { ref subscription, .. })
                if *subscription == QuoteSubscription::candle("binance/btc.usdt", "1m")
        ));
    }

    #[test]
    fn test_classify_unkeyed_data() {
        assert!(matches!(
            QuotePush::classify(json!({"uri": "single-tick-verbose", "data": {}})),
            Ok(QuotePush::Other(_))
        ));
        assert!(matches!(
            QuotePush::classify(json!({"data": {"contract": "x"}})),
            Ok(QuotePush::Other(_))
        ));
    }
}
