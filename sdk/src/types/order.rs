//! Order types.
//!
//! Provides the order record shared by REST queries and push updates, plus
//! the request bodies for placing and amending orders.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy.
    #[serde(rename = "b")]
    Buy,
    /// Sell.
    #[serde(rename = "s")]
    Sell,
}

impl Side {
    /// Returns the wire code (`b` / `s`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "b",
            Self::Sell => "s",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-list filter accepted by `GET /orders?state=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
    /// Orders still working on the exchange.
    Active,
    /// Finished orders (dealt, withdrawn, rejected).
    End,
}

impl OrderState {
    /// Returns the query value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::End => "end",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statuses after which an order never changes again.
const END_STATUSES: &[&str] = &["withdrawn", "part-deal-withdrawn", "dealt", "error-order"];

/// An order as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Id assigned by the exchange.
    pub exchange_oid: String,

    /// Id assigned by the client when placing.
    #[serde(default)]
    pub client_oid: Option<String>,

    /// Contract, e.g. `binance/btc.usdt`.
    #[serde(default)]
    pub contract: Option<String>,

    /// Order status, e.g. `pending`, `part-deal-pending`, `dealt`.
    pub status: String,

    /// Side.
    #[serde(default)]
    pub bs: Option<Side>,

    /// Limit price.
    #[serde(default)]
    pub entrust_price: Option<Decimal>,

    /// Ordered amount.
    #[serde(default)]
    pub entrust_amount: Option<Decimal>,

    /// Filled amount.
    #[serde(default)]
    pub dealt_amount: Option<Decimal>,

    /// Average fill price.
    #[serde(default)]
    pub average_dealt_price: Option<Decimal>,

    /// Creation time as reported by the service.
    #[serde(default)]
    pub entrust_time: Option<String>,

    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Order {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_end(&self) -> bool {
        END_STATUSES.contains(&self.status.as_str())
    }
}

/// Acknowledgement returned by place / cancel calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange order id.
    #[serde(default)]
    pub exchange_oid: Option<String>,

    /// Client order id.
    #[serde(default)]
    pub client_oid: Option<String>,

    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceOrderRequest {
    /// Contract, e.g. `binance/btc.usdt`.
    pub contract: String,

    /// Limit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Side.
    pub bs: Side,

    /// Amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Optional client order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_oid: Option<String>,

    /// Free-form tags, sent as `k1:v1,k2:v2`.
    #[serde(
        skip_serializing_if = "BTreeMap::is_empty",
        serialize_with = "serialize_tags"
    )]
    pub tags: BTreeMap<String, String>,

    /// Exchange-specific options, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl PlaceOrderRequest {
    /// Creates a limit order request.
    #[must_use]
    pub fn new(contract: impl Into<String>, price: Decimal, bs: Side, amount: Decimal) -> Self {
        Self {
            contract: contract.into(),
            price,
            bs,
            amount,
            client_oid: None,
            tags: BTreeMap::new(),
            options: None,
        }
    }

    /// Sets the client order id.
    #[must_use]
    pub fn with_client_oid(mut self, client_oid: impl Into<String>) -> Self {
        self.client_oid = Some(client_oid.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets exchange-specific options.
    #[must_use]
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

fn serialize_tags<S: Serializer>(
    tags: &BTreeMap<String, String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let joined = tags
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    serializer.serialize_str(&joined)
}

/// Body of `PATCH /orders`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmendOrderRequest {
    /// New price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// New amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}
