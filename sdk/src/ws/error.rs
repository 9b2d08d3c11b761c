//! Push session error types.
//!
//! Transport, auth and heartbeat failures never reach subscribers; they
//! drive reconnects inside the session and are logged. Callers only see
//! [`WsError::PushUnsupported`], [`WsError::Closed`] and
//! [`WsError::InvalidConfig`].

use thiserror::Error;

/// Push session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    /// The exchange does not support push for this account.
    #[error("push is not supported for this account")]
    PushUnsupported,

    /// The server rejected the connection.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No pong arrived since the last ping.
    #[error("heartbeat lost")]
    HeartbeatLost,

    /// Inbound frame could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Socket connect failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// WebSocket protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failed to serialize an outbound message.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to write to the socket.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
