//! Fund-movement request bodies: withdrawals, loans and internal transfers.

use rust_decimal::Decimal;
use serde::Serialize;

/// Body of `POST /withdraws`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawRequest {
    /// Currency, e.g. `btc`.
    pub currency: String,

    /// Amount to withdraw.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Destination address.
    pub address: String,

    /// Optional fee.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub fee: Option<Decimal>,

    /// Client withdrawal id; generated when left empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_wid: Option<String>,

    /// Exchange-specific options, sent as a JSON-encoded string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl WithdrawRequest {
    /// Creates a withdrawal request.
    #[must_use]
    pub fn new(currency: impl Into<String>, amount: Decimal, address: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            amount,
            address: address.into(),
            fee: None,
            client_wid: None,
            options: None,
        }
    }

    /// Sets the fee.
    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Sets the client withdrawal id.
    #[must_use]
    pub fn with_client_wid(mut self, client_wid: impl Into<String>) -> Self {
        self.client_wid = Some(client_wid.into());
        self
    }

    /// Sets exchange-specific options.
    #[must_use]
    pub fn with_options(mut self, options: &serde_json::Value) -> Self {
        self.options = Some(options.to_string());
        self
    }
}

/// Body of `POST /borrow`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorrowRequest {
    /// Margin contract.
    pub contract: String,
    /// Currency to borrow.
    pub currency: String,
    /// Amount to borrow.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Body of `POST /return`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepayRequest {
    /// Loan id assigned by the exchange.
    pub exchange_loan_id: String,
    /// Currency to repay.
    pub currency: String,
    /// Amount to repay.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Destination of an internal transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferTarget {
    /// Into the margin account.
    Margin,
    /// Back to the spot account.
    Spot,
}

/// Body of `POST /assets-internal`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginTransferRequest {
    /// Margin contract.
    pub contract: String,
    /// Currency to move.
    pub currency: String,
    /// Amount to move.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Destination.
    pub target: TransferTarget,
}
