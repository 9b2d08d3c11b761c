//! Push protocol messages.
//!
//! Outbound frames are small `{"uri": ...}` objects. Inbound frames are
//! classified into [`PushMessage`] by their `uri` field, with a few
//! special shapes (`no-router-found` has no `uri` at all).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::error::WsError;
use crate::types::{AccountInfo, Order};

/// Error code the server sends when the exchange has no push support.
pub const NO_ROUTER_FOUND: &str = "no-router-found";

/// Acknowledgement values that mean the connection is authenticated.
const CONNECTED_CODES: &[&str] = &["ok", "connected"];

/// Push subscription topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Account info updates.
    Info,
    /// Order updates.
    Order,
}

impl Topic {
    /// Every topic, in replay order.
    pub const ALL: [Topic; 2] = [Topic::Info, Topic::Order];

    /// Returns the subscribe frame for this topic.
    #[must_use]
    pub const fn subscribe(self) -> ClientMessage {
        match self {
            Self::Info => ClientMessage::SubInfo,
            Self::Order => ClientMessage::SubOrder,
        }
    }

    /// Returns the unsubscribe frame for this topic.
    #[must_use]
    pub const fn unsubscribe(self) -> ClientMessage {
        match self {
            Self::Info => ClientMessage::UnsubInfo,
            Self::Order => ClientMessage::UnsubOrder,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Order => "order",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-to-server frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "uri", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Heartbeat ping.
    Ping {
        /// Strictly increasing ping id (microsecond timestamp).
        uuid: u64,
    },
    /// Subscribe to account info.
    SubInfo,
    /// Unsubscribe from account info.
    UnsubInfo,
    /// Subscribe to order updates.
    SubOrder,
    /// Unsubscribe from order updates.
    UnsubOrder,
}

impl ClientMessage {
    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(|e| WsError::Serialization(e.to_string()))
    }

    /// Returns true for `sub-*` frames.
    #[must_use]
    pub const fn is_subscribe(&self) -> bool {
        matches!(self, Self::SubInfo | Self::SubOrder)
    }
}

/// Outcome of a `connection` / `status` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAck {
    /// Authenticated; the session is ready.
    Accepted,
    /// Rejected, with the server's message.
    Rejected(String),
}

/// Server-to-client frames, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    /// Heartbeat reply.
    Pong,
    /// Connection / auth acknowledgement.
    Connection(ConnectionAck),
    /// Account info update.
    Info(Box<AccountInfo>),
    /// Batch of order updates.
    Orders(Vec<Order>),
    /// Topic update carrying a non-ok status.
    TopicError {
        /// Topic the frame belongs to.
        topic: Topic,
        /// Raw frame.
        raw: Value,
    },
    /// The exchange has no push support.
    NoRouterFound,
    /// Recognized JSON without a handler.
    Other(Value),
}

/// Routing fields of an inbound frame. `code`, `status` and `message` are
/// loosely typed: some servers send numbers or objects there.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl Envelope {
    fn code(&self) -> Option<&str> {
        self.code.as_ref().and_then(Value::as_str)
    }

    fn status(&self) -> Option<&str> {
        self.status.as_ref().and_then(Value::as_str)
    }

    fn is_ok(&self) -> bool {
        self.status().map_or(true, |status| status == "ok")
    }

    /// The acknowledgement value: a string `code` wins over `status`.
    fn ack_code(&self) -> Option<&str> {
        self.code().or_else(|| self.status())
    }

    fn reason(&self) -> String {
        [&self.message, &self.code, &self.status]
            .into_iter()
            .find_map(|field| field_text(field.as_ref()))
            .unwrap_or_else(|| "connection rejected".to_string())
    }
}

fn field_text(field: Option<&Value>) -> Option<String> {
    match field? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

impl PushMessage {
    /// Classifies a decoded JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Malformed`] if the frame is not an object or a
    /// topic payload does not decode.
    pub fn classify(mut value: Value) -> Result<Self, WsError> {
        if !value.is_object() {
            return Err(WsError::Malformed(format!("expected object, got {}", value)));
        }
        let envelope = Envelope::deserialize(&value)?;

        let Some(uri) = envelope.uri.as_deref() else {
            if envelope.code() == Some(NO_ROUTER_FOUND) {
                return Ok(Self::NoRouterFound);
            }
            return Err(WsError::Malformed(format!("frame without uri: {}", value)));
        };

        match uri {
            "pong" => Ok(Self::Pong),
            "connection" | "status" => {
                if envelope
                    .ack_code()
                    .is_some_and(|code| CONNECTED_CODES.contains(&code))
                {
                    Ok(Self::Connection(ConnectionAck::Accepted))
                } else {
                    Ok(Self::Connection(ConnectionAck::Rejected(envelope.reason())))
                }
            }
            "info" if envelope.is_ok() => {
                let data = take_data(&mut value)?;
                Ok(Self::Info(Box::new(serde_json::from_value(data)?)))
            }
            "order" if envelope.is_ok() => match take_data(&mut value)? {
                Value::Array(records) => Ok(Self::Orders(decode_orders(&records))),
                other => Err(WsError::Malformed(format!("order data is not a list: {}", other))),
            },
            "info" => Ok(Self::TopicError {
                topic: Topic::Info,
                raw: value,
            }),
            "order" => Ok(Self::TopicError {
                topic: Topic::Order,
                raw: value,
            }),
            _ => Ok(Self::Other(value)),
        }
    }

    /// Parses and classifies a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Malformed`] on invalid JSON or an unexpected shape.
    pub fn from_json(text: &str) -> Result<Self, WsError> {
        Self::classify(serde_json::from_str(text)?)
    }
}

fn take_data(value: &mut Value) -> Result<Value, WsError> {
    value
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| WsError::Malformed("missing data field".to_string()))
}

/// Decodes each record on its own; a bad record is logged and skipped so
/// the rest of the batch still gets routed.
fn decode_orders(records: &[Value]) -> Vec<Order> {
    records
        .iter()
        .filter_map(|record| match Order::deserialize(record) {
            Ok(order) => Some(order),
            Err(err) => {
                warn!(error = %err, record = %record, "skipping undecodable order update");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        assert_eq!(
            ClientMessage::Ping { uuid: 42 }.to_json().expect("json"),
            r#"{"uri":"ping","uuid":42}"#
        );
        assert_eq!(
            ClientMessage::SubInfo.to_json().expect("json"),
            r#"{"uri":"sub-info"}"#
        );
        assert_eq!(
            ClientMessage::UnsubInfo.to_json().expect("json"),
            r#"{"uri":"unsub-info"}"#
        );
        assert_eq!(
            ClientMessage::SubOrder.to_json().expect("json"),
            r#"{"uri":"sub-order"}"#
        );
        assert_eq!(
            ClientMessage::UnsubOrder.to_json().expect("json"),
            r#"{"uri":"unsub-order"}"#
        );
    }

    #[test]
    fn test_topic_frames() {
        assert_eq!(Topic::Info.subscribe(), ClientMessage::SubInfo);
        assert_eq!(Topic::Order.unsubscribe(), ClientMessage::UnsubOrder);
        assert!(Topic::Order.subscribe().is_subscribe());
        assert!(!ClientMessage::Ping { uuid: 1 }.is_subscribe());
    }

    #[test]
    fn test_classify_pong() {
        assert_eq!(
            PushMessage::from_json(r#"{"uri":"pong","uuid":1}"#).expect("pong"),
            PushMessage::Pong
        );
    }

    #[test]
    fn test_classify_no_router_found() {
        assert_eq!(
            PushMessage::from_json(r#"{"code":"no-router-found"}"#).expect("frame"),
            PushMessage::NoRouterFound
        );
    }

    #[test]
    fn test_classify_connection_ack() {
        for frame in [
            r#"{"uri":"connection","code":"ok"}"#,
            r#"{"uri":"connection","status":"connected"}"#,
            r#"{"uri":"status","code":"connected"}"#,
        ] {
            assert_eq!(
                PushMessage::from_json(frame).expect("ack"),
                PushMessage::Connection(ConnectionAck::Accepted),
                "{}",
                frame
            );
        }
    }

    #[test]
    fn test_classify_connection_rejected() {
        let msg = PushMessage::from_json(
            r#"{"uri":"connection","code":"auth-failed","message":"bad signature"}"#,
        )
        .expect("ack");
        assert_eq!(
            msg,
            PushMessage::Connection(ConnectionAck::Rejected("bad signature".to_string()))
        );
    }

    #[test]
    fn test_classify_orders() {
        let msg = PushMessage::from_json(
            r#"{"uri":"order","status":"ok","data":[{"exchange_oid":"X1","status":"open"}]}"#,
        )
        .expect("orders");
        match msg {
            PushMessage::Orders(orders) => {
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].exchange_oid, "X1");
                assert_eq!(orders[0].status, "open");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_orders_keeps_good_records() {
        let msg = PushMessage::from_json(
            r#"{"uri":"order","status":"ok","data":[
                {"exchange_oid":"X1","status":"open"},
                {"exchange_oid":null,"client_oid":"c2","status":"error-order"},
                {"exchange_oid":"X3","status":"dealt"}
            ]}"#,
        )
        .expect("orders");
        match msg {
            PushMessage::Orders(orders) => {
                let ids: Vec<&str> = orders.iter().map(|o| o.exchange_oid.as_str()).collect();
                assert_eq!(ids, vec!["X1", "X3"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_connection_ack_with_loose_fields() {
        for frame in [
            r#"{"uri":"connection","status":"ok","code":0}"#,
            r#"{"uri":"connection","code":"ok","message":{"detail":"welcome"}}"#,
        ] {
            assert_eq!(
                PushMessage::from_json(frame).expect("ack"),
                PushMessage::Connection(ConnectionAck::Accepted),
                "{}",
                frame
            );
        }

        let msg = PushMessage::from_json(r#"{"uri":"connection","code":401}"#).expect("ack");
        assert_eq!(
            msg,
            PushMessage::Connection(ConnectionAck::Rejected("401".to_string()))
        );
    }

    #[test]
    fn test_classify_info_default_status() {
        let msg = PushMessage::from_json(r#"{"uri":"info","data":{"balance":10.5,"position":[]}}"#)
            .expect("info");
        match msg {
            PushMessage::Info(info) => assert!(info.balance.is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_topic_error() {
        let msg = PushMessage::from_json(r#"{"uri":"order","status":"error","message":"x"}"#)
            .expect("frame");
        assert!(matches!(
            msg,
            PushMessage::TopicError {
                topic: Topic::Order,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_other() {
        let msg = PushMessage::from_json(r#"{"uri":"sub-info","code":"ok"}"#).expect("frame");
        assert!(matches!(msg, PushMessage::Other(_)));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            PushMessage::from_json("not json"),
            Err(WsError::Malformed(_))
        ));
        assert!(matches!(
            PushMessage::from_json("[1,2]"),
            Err(WsError::Malformed(_))
        ));
        assert!(matches!(
            PushMessage::from_json(r#"{"code":"other"}"#),
            Err(WsError::Malformed(_))
        ));
        assert!(matches!(
            PushMessage::from_json(r#"{"uri":"order","data":{"bad":true}}"#),
            Err(WsError::Malformed(_))
        ));
    }
}
