//! API credentials.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OT_KEY";

/// Environment variable holding the API secret.
pub const API_SECRET_ENV: &str = "OT_SECRET";

/// Errors raised while loading credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    /// A required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    /// Key or secret is empty.
    #[error("api key and secret must not be empty")]
    Empty,
}

/// API key and secret for one trading account.
///
/// Immutable once built; share it behind an `Arc` between the REST client and
/// any push session of the same account.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: Box<[u8]>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Creates credentials from an API key and secret.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into().into_bytes().into_boxed_slice(),
        }
    }

    /// Loads credentials from `OT_KEY` and `OT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is unset or empty.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| CredentialsError::MissingEnv(API_KEY_ENV))?;
        let api_secret = std::env::var(API_SECRET_ENV)
            .map_err(|_| CredentialsError::MissingEnv(API_SECRET_ENV))?;

        let credentials = Self::new(api_key, api_secret);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Checks that neither key nor secret is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Empty`] otherwise.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(CredentialsError::Empty);
        }
        Ok(())
    }

    /// Signs a message with HMAC-SHA256 and returns the lowercase hex digest.
    #[must_use]
    pub fn sign(&self, message: &str) -> String {
        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac = match HmacSha256::new_from_slice(&self.api_secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
