//! SDK error types.
//!
//! [`SdkError`] unifies the REST, push-session and credential errors so
//! application code can use a single `?` target.

use crate::auth::CredentialsError;
use crate::client::ClientError;
use crate::ws::WsError;

/// SDK errors.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid account symbol.
    #[error("invalid account symbol: {0}")]
    InvalidSymbol(String),

    /// Credentials could not be loaded.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// REST call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Push session failed.
    #[error(transparent)]
    Ws(#[from] WsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SdkError::InvalidSymbol("binance".to_string());
        assert_eq!(err.to_string(), "invalid account symbol: binance");
    }

    #[test]
    fn test_error_from_client() {
        let err: SdkError = ClientError::Timeout.into();
        assert_eq!(err.to_string(), "request timeout");
    }

    #[test]
    fn test_error_from_ws() {
        let err: SdkError = WsError::PushUnsupported.into();
        assert!(matches!(err, SdkError::Ws(WsError::PushUnsupported)));
    }
}
