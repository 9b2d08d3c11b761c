//! Withdrawal, deposit, loan and internal-transfer endpoints.

use rust_decimal::Decimal;
use tracing::debug;

use super::error::ClientError;
use super::http::AccountClient;
use crate::types::{
    rand_client_wid, BorrowRequest, MarginTransferRequest, RepayRequest, TransferTarget,
    WithdrawRequest,
};

impl AccountClient {
    /// Requests a withdrawal.
    ///
    /// `POST /withdraws`. A client withdrawal id is generated when the
    /// request carries none.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post_withdraw(
        &self,
        mut request: WithdrawRequest,
    ) -> Result<serde_json::Value, ClientError> {
        if request.client_wid.is_none() {
            request.client_wid = Some(rand_client_wid(self.symbol().exchange(), &request.currency));
        }
        debug!(
            currency = %request.currency,
            amount = %request.amount,
            address = %request.address,
            client_wid = ?request.client_wid,
            "post withdraw"
        );
        self.post("/withdraws", &request).await
    }

    /// Cancels a withdrawal by exchange withdrawal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cancel_withdraw_use_exchange_wid(
        &self,
        exchange_wid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.delete("/withdraws", &[("exchange_wid", exchange_wid.to_string())])
            .await
    }

    /// Cancels a withdrawal by client withdrawal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cancel_withdraw_use_client_wid(
        &self,
        client_wid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.delete("/withdraws", &[("client_wid", client_wid.to_string())])
            .await
    }

    /// Gets a withdrawal by exchange withdrawal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_withdraw_use_exchange_wid(
        &self,
        exchange_wid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.get("/withdraws", &[("exchange_wid", exchange_wid.to_string())])
            .await
    }

    /// Gets a withdrawal by client withdrawal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_withdraw_use_client_wid(
        &self,
        client_wid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.get("/withdraws", &[("client_wid", client_wid.to_string())])
            .await
    }

    /// Lists deposits of a currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_deposit_list(&self, currency: &str) -> Result<serde_json::Value, ClientError> {
        self.get("/deposits", &[("currency", currency.to_string())])
            .await
    }

    /// Lists deposit addresses of a currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_deposit_addr_list(
        &self,
        currency: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.get("/deposits/addresses", &[("currency", currency.to_string())])
            .await
    }

    /// Lists loan records of a margin contract.
    ///
    /// Falls back to the account's margin contract when `contract` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract is known or the request fails.
    pub async fn get_loan_records(
        &self,
        contract: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        let contract = self.margin_contract(contract)?;
        self.get("/loan-records", &[("contract", contract)]).await
    }

    /// Borrows on a margin contract.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract is known or the request fails.
    pub async fn borrow(
        &self,
        currency: &str,
        amount: Decimal,
        contract: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        let body = BorrowRequest {
            contract: self.margin_contract(contract)?,
            currency: currency.to_string(),
            amount,
        };
        debug!(contract = %body.contract, currency, amount = %amount, "borrow");
        self.post("/borrow", &body).await
    }

    /// Repays a loan.
    ///
    /// `POST /return`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn repay(
        &self,
        exchange_loan_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<serde_json::Value, ClientError> {
        let body = RepayRequest {
            exchange_loan_id: exchange_loan_id.to_string(),
            currency: currency.to_string(),
            amount,
        };
        debug!(exchange_loan_id, currency, amount = %amount, "repay");
        self.post("/return", &body).await
    }

    /// Moves funds from spot into the margin account.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract is known or the request fails.
    pub async fn margin_transfer_in(
        &self,
        currency: &str,
        amount: Decimal,
        contract: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        self.margin_transfer(currency, amount, contract, TransferTarget::Margin)
            .await
    }

    /// Moves funds from the margin account back to spot.
    ///
    /// # Errors
    ///
    /// Returns an error if no contract is known or the request fails.
    pub async fn margin_transfer_out(
        &self,
        currency: &str,
        amount: Decimal,
        contract: Option<&str>,
    ) -> Result<serde_json::Value, ClientError> {
        self.margin_transfer(currency, amount, contract, TransferTarget::Spot)
            .await
    }

    async fn margin_transfer(
        &self,
        currency: &str,
        amount: Decimal,
        contract: Option<&str>,
        target: TransferTarget,
    ) -> Result<serde_json::Value, ClientError> {
        let body = MarginTransferRequest {
            contract: self.margin_contract(contract)?,
            currency: currency.to_string(),
            amount,
            target,
        };
        debug!(contract = %body.contract, currency, amount = %amount, target = ?target, "margin transfer");
        self.post("/assets-internal", &body).await
    }

    fn margin_contract(&self, contract: Option<&str>) -> Result<String, ClientError> {
        contract
            .or_else(|| self.symbol().margin_contract())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidRequest(format!(
                    "no margin contract given and account {} has none",
                    self.symbol()
                ))
            })
    }
}
