//! Account symbols.
//!
//! An account is addressed as `exchange/account`, e.g. `binance/otplay`.
//! Margin accounts append the margin pair: `huobip/otplay/btc.usdt`.

use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// Parsed account symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountSymbol {
    exchange: String,
    account: String,
    margin_contract: Option<String>,
}

impl AccountSymbol {
    /// Creates a symbol from its parts.
    #[must_use]
    pub fn new(exchange: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            account: account.into(),
            margin_contract: None,
        }
    }

    /// Returns the exchange name.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Returns the account name on that exchange.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the default margin contract (`exchange/pair`), if any.
    #[must_use]
    pub fn margin_contract(&self) -> Option<&str> {
        self.margin_contract.as_deref()
    }

    /// Returns the signed REST path prefix `/{exchange}/{account}`.
    #[must_use]
    pub fn rest_path(&self) -> String {
        format!("/{}/{}", self.exchange, self.account)
    }

    /// Returns the path signed during the push handshake, `/ws/{account}`.
    #[must_use]
    pub fn ws_sign_path(&self) -> String {
        format!("/ws/{}", self.account)
    }
}

impl FromStr for AccountSymbol {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let exchange = parts.next().unwrap_or_default();
        let account = parts.next().unwrap_or_default();
        let margin = parts.next();

        if exchange.is_empty() || account.is_empty() {
            return Err(SdkError::InvalidSymbol(s.to_string()));
        }

        let margin_contract = match margin {
            Some("") => return Err(SdkError::InvalidSymbol(s.to_string())),
            Some(pair) => Some(format!("{}/{}", exchange, pair)),
            None => None,
        };

        Ok(Self {
            exchange: exchange.to_string(),
            account: account.to_string(),
            margin_contract,
        })
    }
}

impl fmt::Display for AccountSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.margin_contract {
            Some(contract) => {
                let pair = contract.split_once('/').map_or(contract.as_str(), |(_, p)| p);
                write!(f, "{}/{}/{}", self.exchange, self.account, pair)
            }
            None => write!(f, "{}/{}", self.exchange, self.account),
        }
    }
}
