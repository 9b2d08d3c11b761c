//! Signed REST client for the 1Token trade API.
//!
//! Each [`AccountClient`] addresses one `exchange/account` pair. Calls are
//! stateless: every request gets a fresh nonce and signature, and every
//! failure is returned as a [`ClientError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use onetoken_sdk::auth::Credentials;
//! use onetoken_sdk::client::AccountClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Arc::new(Credentials::from_env()?);
//!     let client = AccountClient::with_symbol("binance/otplay", credentials)?;
//!
//!     let info = client.get_info().await?;
//!     println!("balance: {:?}", info.balance);
//!
//!     let pending = client.get_pending_list(Some("binance/eos.usdt")).await?;
//!     println!("{} working orders", pending.len());
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod config;
pub mod error;
pub mod funds;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::AccountClient;
