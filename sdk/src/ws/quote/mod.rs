//! Real-time market data.
//!
//! A [`QuoteSession`] keeps one connection to the market-data push host
//! and fans tick and candle updates out to handlers keyed by contract and
//! channel. Frames may arrive gzip-compressed. The connection opens on the
//! first subscription and every subscription is sent again after a
//! reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use onetoken_sdk::ws::quote::{QuoteConfig, QuoteSession, QuoteUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quotes = QuoteSession::new(QuoteConfig::default())?;
//!     quotes
//!         .subscribe_tick("huobip/btc.usdt", |update: &QuoteUpdate| {
//!             println!("{} {}", update.subscription, update.data);
//!         })
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     quotes.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod machine;
pub mod messages;
pub mod session;

pub use config::{QuoteConfig, DEFAULT_QUOTE_HOST_WS};
pub use machine::{QuoteCore, QuoteEffect};
pub use messages::{QuoteChannel, QuotePush, QuoteRequest, QuoteSubscription, QuoteUpdate};
pub use session::{QuoteSession, QuoteStatus};
