//! Account information.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account snapshot returned by `GET /info` and pushed on the `info` topic.
///
/// Fields the SDK does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Total account value.
    #[serde(default)]
    pub balance: Option<Decimal>,

    /// Cash part of the balance.
    #[serde(default)]
    pub cash: Option<Decimal>,

    /// Market value of non-cash positions.
    #[serde(default)]
    pub market_value: Option<Decimal>,

    /// Per-contract positions.
    #[serde(default)]
    pub position: Vec<Position>,

    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AccountInfo {
    /// Returns the position for a contract or currency, if held.
    #[must_use]
    pub fn position(&self, contract: &str) -> Option<&Position> {
        self.position.iter().find(|p| p.contract == contract)
    }
}

/// One position line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Contract or currency symbol.
    pub contract: String,

    /// Total amount held.
    #[serde(default)]
    pub total_amount: Option<Decimal>,

    /// Amount available for trading.
    #[serde(default)]
    pub available: Option<Decimal>,

    /// Amount frozen in open orders.
    #[serde(default)]
    pub frozen: Option<Decimal>,

    /// Market value of the position.
    #[serde(default)]
    pub market_value: Option<Decimal>,

    /// Position kind reported by the service (e.g. `spot`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
