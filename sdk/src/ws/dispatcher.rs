//! Inbound frame decoding and routing.
//!
//! Text frames carry JSON; binary frames carry gzip-compressed JSON. A
//! frame that fails to decode is logged and skipped, the receive loop
//! keeps going.

use std::io::Read;
use std::time::Instant;

use flate2::read::GzDecoder;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::error::WsError;
use super::machine::{Effect, SessionCore};
use super::messages::{ConnectionAck, PushMessage};

/// Decodes a gzip-compressed JSON frame.
///
/// # Errors
///
/// Returns [`WsError::Malformed`] if decompression or parsing fails.
pub fn decode_gzip(bytes: &[u8]) -> Result<Value, WsError> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| WsError::Malformed(format!("gzip: {}", e)))?;
    Ok(serde_json::from_str(&text)?)
}

/// Decodes the JSON payload of a data frame. Control frames yield `None`.
///
/// # Errors
///
/// Returns [`WsError::Malformed`] if the payload is not JSON.
pub fn decode_json(message: &Message) -> Result<Option<Value>, WsError> {
    match message {
        Message::Text(text) => {
            debug!(frame = %text.as_str(), "text frame");
            Ok(Some(serde_json::from_str(text.as_str())?))
        }
        Message::Binary(bytes) => decode_gzip(bytes).map(Some),
        _ => Ok(None),
    }
}

/// Decodes and classifies an account push frame. Control frames yield `None`.
///
/// # Errors
///
/// Returns [`WsError::Malformed`] if the payload does not decode.
pub fn decode_frame(message: &Message) -> Result<Option<PushMessage>, WsError> {
    decode_json(message)?.map(PushMessage::classify).transpose()
}

impl SessionCore {
    /// Routes one classified frame.
    pub fn on_push(&mut self, message: PushMessage, now: Instant) -> Vec<Effect> {
        match message {
            PushMessage::Pong => {
                self.last_pong = Some(now);
                Vec::new()
            }
            PushMessage::Connection(ConnectionAck::Accepted) => self.on_accepted(),
            PushMessage::Connection(ConnectionAck::Rejected(reason)) => self.on_rejected(&reason),
            PushMessage::Info(account) => {
                self.registry.dispatch_info(&account);
                Vec::new()
            }
            PushMessage::Orders(orders) => {
                self.registry.dispatch_orders(orders, now);
                Vec::new()
            }
            PushMessage::TopicError { topic, raw } => {
                warn!(topic = %topic, frame = %raw, "topic update error");
                Vec::new()
            }
            PushMessage::NoRouterFound => self.disable_push(),
            PushMessage::Other(raw) => {
                info!(frame = %raw, "unhandled message");
                Vec::new()
            }
        }
    }

    /// Decodes and routes one socket frame. Bad frames are logged and dropped.
    pub fn on_frame(&mut self, message: &Message, now: Instant) -> Vec<Effect> {
        match decode_frame(message) {
            Ok(Some(push)) => self.on_push(push, now),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "unexpected message format");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("write");
        encoder.finish().expect("finish")
    }

    #[test]
    fn test_decode_text_frame() {
        let frame = Message::Text(r#"{"uri":"pong"}"#.into());
        assert_eq!(
            decode_frame(&frame).expect("decode"),
            Some(PushMessage::Pong)
        );
    }

    #[test]
    fn test_decode_gzip_frame() {
        let frame = Message::Binary(gzip(r#"{"uri":"pong","uuid":7}"#).into());
        assert_eq!(
            decode_frame(&frame).expect("decode"),
            Some(PushMessage::Pong)
        );
    }

    #[test]
    fn test_decode_gzip_json() {
        let value = decode_gzip(&gzip(r#"{"uri":"single-tick-verbose","data":{}}"#)).expect("decode");
        assert_eq!(value["uri"], "single-tick-verbose");
    }

    #[test]
    fn test_decode_bad_gzip() {
        let frame = Message::Binary(vec![1u8, 2, 3].into());
        assert!(matches!(decode_frame(&frame), Err(WsError::Malformed(_))));
    }

    #[test]
    fn test_control_frames_ignored() {
        assert_eq!(
            decode_frame(&Message::Ping(Vec::new().into())).expect("decode"),
            None
        );
    }
}
