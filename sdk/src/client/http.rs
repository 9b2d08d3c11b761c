//! HTTP client implementation.
//!
//! Provides the signed HTTP core shared by every account endpoint.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::auth::{Credentials, RequestSigner};
use crate::error::SdkError;
use crate::types::AccountSymbol;
use crate::ws::{AccountSession, WsConfig, WsError};

/// Query parameters of one call.
pub(crate) type Params<'a> = [(&'a str, String)];

/// Signed REST client for one trading account.
///
/// Every call is independent: a fresh nonce is drawn, the request is signed
/// over `verb + /{exchange}/{account}{endpoint} + nonce + body`, and the
/// response is classified by status class before any JSON decoding.
#[derive(Debug, Clone)]
pub struct AccountClient {
    config: ClientConfig,
    http: reqwest::Client,
    symbol: AccountSymbol,
    signer: Arc<RequestSigner>,
}

impl AccountClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(
        symbol: AccountSymbol,
        credentials: Arc<Credentials>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            config,
            http,
            symbol,
            signer: Arc::new(RequestSigner::new(credentials)),
        })
    }

    /// Creates a client with default configuration from a symbol string
    /// such as `binance/otplay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is malformed or the client cannot be
    /// created.
    pub fn with_symbol(symbol: &str, credentials: Arc<Credentials>) -> Result<Self, SdkError> {
        let symbol = symbol.parse()?;
        Ok(Self::new(symbol, credentials, ClientConfig::default())?)
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the account symbol.
    #[must_use]
    pub fn symbol(&self) -> &AccountSymbol {
        &self.symbol
    }

    /// Returns the shared credentials.
    #[must_use]
    pub fn credentials(&self) -> &Arc<Credentials> {
        self.signer.credentials()
    }

    /// Starts a push session for the same account and credentials.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the push configuration is invalid.
    pub fn session(&self, config: WsConfig) -> Result<AccountSession, WsError> {
        AccountSession::new(self.symbol.clone(), Arc::clone(self.credentials()), config)
    }

    /// Returns the full URL of an account endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.config.host(), self.symbol.rest_path(), endpoint)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params<'_>,
    ) -> Result<T, ClientError> {
        self.call(Method::GET, endpoint, params, String::new()).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params<'_>,
    ) -> Result<T, ClientError> {
        self.call(Method::DELETE, endpoint, params, String::new())
            .await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = encode_body(body)?;
        self.call(Method::POST, endpoint, &[], body).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        params: &Params<'_>,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = encode_body(body)?;
        self.call(Method::PATCH, endpoint, params, body).await
    }

    /// Sends one signed request and decodes the JSON response.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &Params<'_>,
        body: String,
    ) -> Result<T, ClientError> {
        let path = format!("{}{}", self.symbol.rest_path(), endpoint);
        let auth = self.signer.signed_headers(method.as_str(), &path, &body);
        let url = format!("{}{}", self.config.host(), path);

        debug!(method = %method, path = %path, params = params.len(), "api call");

        let mut request = self.http.request(method, &url);
        for (name, value) in auth.pairs() {
            request = request.header(name, value);
        }
        if !params.is_empty() {
            request = request.query(params);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, path = %path, "api call rejected");
            return Err(ClientError::from_status(status, text));
        }

        serde_json::from_str(&text).map_err(|_| ClientError::NonJson { body: text })
    }
}

/// Serializes a request body; an empty JSON object is sent as no body.
fn encode_body<B: Serialize>(body: &B) -> Result<String, ClientError> {
    let value = serde_json::to_value(body).map_err(|e| ClientError::Serialization(e.to_string()))?;
    if value.as_object().is_some_and(serde_json::Map::is_empty) {
        return Ok(String::new());
    }
    serde_json::to_string(&value).map_err(|e| ClientError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Arc<Credentials> {
        Arc::new(Credentials::new("ot-key", "ot-secret"))
    }

    #[test]
    fn test_client_new() {
        let symbol = AccountSymbol::new("binance", "otplay");
        let client = AccountClient::new(symbol, credentials(), ClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_symbol() {
        let client = AccountClient::with_symbol("binance/otplay", credentials())
            .expect("client creation");
        assert_eq!(client.symbol().exchange(), "binance");
        assert_eq!(client.credentials().api_key(), "ot-key");
    }

    #[test]
    fn test_client_with_bad_symbol() {
        let result = AccountClient::with_symbol("binance", credentials());
        assert!(matches!(result, Err(SdkError::InvalidSymbol(_))));
    }

    #[test]
    fn test_client_invalid_config() {
        let symbol = AccountSymbol::new("binance", "otplay");
        let client = AccountClient::new(symbol, credentials(), ClientConfig::new(""));
        assert!(client.is_err());
    }

    #[test]
    fn test_client_url() {
        let symbol = AccountSymbol::new("binance", "otplay");
        let config = ClientConfig::new("https://1token.trade/api/v1/trade/");
        let client = AccountClient::new(symbol, credentials(), config).expect("client creation");
        assert_eq!(
            client.url("/orders"),
            "https://1token.trade/api/v1/trade/binance/otplay/orders"
        );
    }

    #[test]
    fn test_encode_body() {
        assert_eq!(encode_body(&serde_json::json!({})).expect("encode"), "");
        assert_eq!(
            encode_body(&serde_json::json!({"a": 1})).expect("encode"),
            r#"{"a":1}"#
        );
    }
}
