//! Real-time push: account sessions and market data.
//!
//! An [`AccountSession`] keeps one authenticated WebSocket connection per
//! account and multiplexes it into `info` and `order` subscriptions. The
//! connection is opened on the first subscription, kept alive with a 10 s
//! ping, re-established with backoff when it drops, and released when the
//! last subscription goes away. After every reconnect the active topics are
//! subscribed again.
//!
//! Market data (ticks and candles) uses a separate, unsigned connection;
//! see [`quote`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use onetoken_sdk::auth::Credentials;
//! use onetoken_sdk::types::{AccountInfo, Order};
//! use onetoken_sdk::ws::{AccountSession, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Arc::new(Credentials::from_env()?);
//!     let session = AccountSession::with_symbol("binance/otplay", credentials, WsConfig::default())?;
//!
//!     session
//!         .subscribe_info(|info: &AccountInfo| println!("balance {:?}", info.balance))
//!         .await?;
//!     session
//!         .subscribe_orders(|order: &Order| println!("{} {}", order.exchange_oid, order.status))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod machine;
pub mod messages;
pub mod quote;
pub mod registry;
pub mod session;
mod transport;

pub use config::WsConfig;
pub use error::WsError;
pub use handler::{InfoHandler, OrderHandler, QuoteHandler};
pub use machine::{Effect, SessionCore, SessionState};
pub use messages::{ClientMessage, ConnectionAck, PushMessage, Topic};
pub use quote::{QuoteConfig, QuoteSession, QuoteSubscription, QuoteUpdate};
pub use registry::{Registry, Removal, DEFAULT_HANDLER_NAME, WILDCARD_KEY};
pub use session::{AccountSession, SessionStatus};
