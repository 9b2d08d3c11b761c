//! Credentials and request signing.
//!
//! Every REST call and the push-session handshake are authenticated with the
//! same three headers: `Api-Nonce`, `Api-Key` and `Api-Signature`, where the
//! signature is a hex HMAC-SHA256 over `verb + path + nonce + body`.

pub mod credentials;
pub mod signer;

pub use credentials::{Credentials, CredentialsError, API_KEY_ENV, API_SECRET_ENV};
pub use signer::{
    RequestSigner, SignedHeaders, API_KEY_HEADER, API_NONCE_HEADER, API_SIGNATURE_HEADER,
};
