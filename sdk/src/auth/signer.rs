//! Request signer.
//!
//! Produces the `Api-Nonce` / `Api-Key` / `Api-Signature` header triple used
//! by both the REST client and the push-session handshake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::credentials::Credentials;

/// Nonce header name.
pub const API_NONCE_HEADER: &str = "Api-Nonce";

/// API key header name.
pub const API_KEY_HEADER: &str = "Api-Key";

/// Signature header name.
pub const API_SIGNATURE_HEADER: &str = "Api-Signature";

/// Signed authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Microsecond nonce, as a decimal string.
    pub nonce: String,
    /// API key.
    pub api_key: String,
    /// Hex HMAC-SHA256 signature.
    pub signature: String,
}

impl SignedHeaders {
    /// Returns the `(name, value)` header pairs.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (API_NONCE_HEADER, self.nonce.as_str()),
            (API_KEY_HEADER, self.api_key.as_str()),
            (API_SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }
}

/// Signs requests for one set of credentials.
///
/// Nonces are microsecond timestamps, bumped when needed so that two
/// requests from the same signer never share a nonce.
#[derive(Debug)]
pub struct RequestSigner {
    credentials: Arc<Credentials>,
    last_nonce: AtomicU64,
}

impl RequestSigner {
    /// Creates a signer over shared credentials.
    #[must_use]
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self {
            credentials,
            last_nonce: AtomicU64::new(0),
        }
    }

    /// Returns the credentials used by this signer.
    #[must_use]
    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Returns a strictly increasing microsecond nonce.
    pub fn next_nonce(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
        let previous = match self.last_nonce.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now.max(last.saturating_add(1))),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        now.max(previous.saturating_add(1))
    }

    /// Builds the signed message `verb + path + nonce + body`.
    #[must_use]
    pub fn message(verb: &str, path: &str, nonce: u64, body: &str) -> String {
        format!("{}{}{}{}", verb, path, nonce, body)
    }

    /// Signs `verb + path + nonce + body`.
    #[must_use]
    pub fn sign(&self, verb: &str, path: &str, nonce: u64, body: &str) -> String {
        self.credentials
            .sign(&Self::message(verb, path, nonce, body))
    }

    /// Builds the full header triple for a request with a fresh nonce.
    ///
    /// `path` is the signed path only (no host, no query string).
    #[must_use]
    pub fn signed_headers(&self, verb: &str, path: &str, body: &str) -> SignedHeaders {
        let nonce = self.next_nonce();
        SignedHeaders {
            nonce: nonce.to_string(),
            api_key: self.credentials.api_key().to_string(),
            signature: self.sign(verb, path, nonce, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        RequestSigner::new(Arc::new(Credentials::new("ot-key", "ot-secret")))
    }

    #[test]
    fn test_message_layout() {
        assert_eq!(
            RequestSigner::message("POST", "/binance/otplay/orders", 1_566_000_000_000_000, "{}"),
            "POST/binance/otplay/orders1566000000000000{}"
        );
    }

    #[test]
    fn test_signature_recomputes() {
        let signer = signer();
        let body = r#"{"contract":"binance/btc.usdt","price":10,"bs":"b","amount":1}"#;
        let headers = signer.signed_headers("POST", "/binance/otplay/orders", body);

        let nonce: u64 = headers.nonce.parse().expect("numeric nonce");
        let expected = Credentials::new("ot-key", "ot-secret")
            .sign(&format!("POST/binance/otplay/orders{}{}", nonce, body));

        assert_eq!(headers.signature, expected);
        assert_eq!(headers.api_key, "ot-key");
        assert_eq!(headers.signature.len(), 64);
    }

    #[test]
    fn test_ws_handshake_signature_has_empty_body() {
        let signer = signer();
        let headers = signer.signed_headers("GET", "/ws/otplay", "");
        let nonce: u64 = headers.nonce.parse().expect("numeric nonce");
        assert_eq!(headers.signature, signer.sign("GET", "/ws/otplay", nonce, ""));
    }

    #[test]
    fn test_nonce_strictly_increasing() {
        let signer = signer();
        let mut last = 0;
        for _ in 0..1000 {
            let nonce = signer.next_nonce();
            assert!(nonce > last);
            last = nonce;
        }
    }

    #[test]
    fn test_header_pairs() {
        let headers = SignedHeaders {
            nonce: "1".to_string(),
            api_key: "k".to_string(),
            signature: "s".to_string(),
        };
        let pairs = headers.pairs();
        assert_eq!(pairs[0], ("Api-Nonce", "1"));
        assert_eq!(pairs[1], ("Api-Key", "k"));
        assert_eq!(pairs[2], ("Api-Signature", "s"));
    }
}
