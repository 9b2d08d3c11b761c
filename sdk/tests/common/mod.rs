//! Shared helpers for onetoken-sdk integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use onetoken_sdk::auth::{Credentials, RequestSigner};
use onetoken_sdk::client::{AccountClient, ClientConfig};
use wiremock::MockServer;

pub const API_KEY: &str = "ot-test-key";
pub const API_SECRET: &str = "ot-test-secret";
pub const SYMBOL: &str = "binance/otplay";

pub fn credentials() -> Arc<Credentials> {
    Arc::new(Credentials::new(API_KEY, API_SECRET))
}

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client for `binance/otplay` pointed at the mock server.
pub fn client_for(server: &MockServer) -> AccountClient {
    let symbol = SYMBOL.parse().expect("valid symbol");
    AccountClient::new(symbol, credentials(), ClientConfig::new(server.uri()))
        .expect("client creation")
}

/// Recomputes the signature the service expects.
pub fn expected_signature(verb: &str, path: &str, nonce: u64, body: &str) -> String {
    RequestSigner::new(credentials()).sign(verb, path, nonce, body)
}
