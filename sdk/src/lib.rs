//! 1Token SDK - Rust client library for the 1Token trading service.
//!
//! This crate manages one trading account at a time and streams market data:
//!
//! - [`client::AccountClient`] — signed REST calls for orders, balances,
//!   withdrawals, loans and transfers.
//! - [`ws::AccountSession`] — a long-lived push session delivering account
//!   info and order updates, with heartbeat, automatic reconnect and
//!   subscription replay.
//! - [`ws::QuoteSession`] — unsigned market-data push (ticks and candles).
//!
//! The account channels share the same [`auth::Credentials`]; nothing in
//! the crate keeps process-wide state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use onetoken_sdk::auth::Credentials;
//! use onetoken_sdk::client::AccountClient;
//! use onetoken_sdk::types::{PlaceOrderRequest, Side};
//! use onetoken_sdk::ws::WsConfig;
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Arc::new(Credentials::from_env()?);
//!     let client = AccountClient::with_symbol("binance/otplay", credentials)?;
//!
//!     let request = PlaceOrderRequest::new(
//!         "binance/eos.usdt",
//!         Decimal::new(25, 1),
//!         Side::Buy,
//!         Decimal::from(10),
//!     );
//!     let ack = client.place_order(&request).await?;
//!     println!("placed {:?}", ack.exchange_oid);
//!
//!     let session = client.session(WsConfig::default())?;
//!     session.subscribe_order_queues().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod types;
pub mod ws;

pub use auth::Credentials;
pub use client::{AccountClient, ClientConfig, ClientError};
pub use error::SdkError;
pub use types::{AccountInfo, AccountSymbol, Order, OrderAck, PlaceOrderRequest, Side};
pub use ws::{AccountSession, QuoteConfig, QuoteSession, SessionState, WsConfig, WsError};
