//! Client error types.
//!
//! Provides error types for REST calls. Every call returns these as a
//! plain `Result`, so callers decide whether to retry.

use reqwest::StatusCode;

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure other than a timeout.
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The request timed out.
    #[error("request timeout")]
    Timeout,

    /// The service answered 4xx; `body` is the raw response text.
    #[error("client error [{status}]: {body}")]
    HttpClient {
        /// HTTP status.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },

    /// The service answered 5xx; `body` is the raw response text.
    #[error("server error [{status}]: {body}")]
    HttpServer {
        /// HTTP status.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },

    /// A 2xx response whose body is not the expected JSON.
    #[error("response is not valid JSON: {body}")]
    NonJson {
        /// Raw response body.
        body: String,
    },

    /// Failed to serialize the request body.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The call was rejected before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Classifies a non-success response by status class.
    #[must_use]
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status.is_server_error() {
            Self::HttpServer { status, body }
        } else {
            Self::HttpClient { status, body }
        }
    }

    /// Returns the HTTP status for response errors.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpClient { status, .. } | Self::HttpServer { status, .. } => Some(*status),
            Self::Request(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true if repeating the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Request(_) | Self::HttpServer { .. }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies() {
        let err = ClientError::from_status(StatusCode::BAD_REQUEST, "bad".to_string());
        assert!(matches!(err, ClientError::HttpClient { .. }));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!err.is_retryable());

        let err = ClientError::from_status(StatusCode::BAD_GATEWAY, "oops".to_string());
        assert!(matches!(err, ClientError::HttpServer { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::HttpServer {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "internal error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server error [500 Internal Server Error]: internal error"
        );
    }

    #[test]
    fn test_client_error_timeout() {
        let err = ClientError::Timeout;
        assert_eq!(err.to_string(), "request timeout");
        assert!(err.is_retryable());
        assert!(err.status().is_none());
    }

    #[test]
    fn test_client_error_non_json() {
        let err = ClientError::NonJson {
            body: "<html>".to_string(),
        };
        assert_eq!(err.to_string(), "response is not valid JSON: <html>");
    }
}
