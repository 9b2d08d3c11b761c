//! Account and order endpoints.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::debug;

use super::error::ClientError;
use super::http::AccountClient;
use crate::types::{
    rand_client_oid, AccountInfo, AmendOrderRequest, Order, OrderAck, OrderState,
    PlaceOrderRequest,
};

/// Query helper value selecting the service's order database.
const DB_SOURCE: &str = "db";

impl AccountClient {
    /// Gets the account snapshot.
    ///
    /// `GET /info`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_info(&self) -> Result<AccountInfo, ClientError> {
        self.get("/info", &[]).await
    }

    /// Gets the account connection status.
    ///
    /// `GET /status`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_status(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/status", &[]).await
    }

    /// Lists orders, optionally filtered by contract and state.
    ///
    /// `GET /orders`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_order_list(
        &self,
        contract: Option<&str>,
        state: Option<OrderState>,
    ) -> Result<Vec<Order>, ClientError> {
        self.order_list(contract, state, None).await
    }

    /// Lists orders from the service's order database rather than the
    /// exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_order_list_from_db(
        &self,
        contract: Option<&str>,
        state: Option<OrderState>,
    ) -> Result<Vec<Order>, ClientError> {
        self.order_list(contract, state, Some(DB_SOURCE)).await
    }

    /// Lists working orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_pending_list(&self, contract: Option<&str>) -> Result<Vec<Order>, ClientError> {
        self.get_order_list(contract, None).await
    }

    async fn order_list(
        &self,
        contract: Option<&str>,
        state: Option<OrderState>,
        source: Option<&str>,
    ) -> Result<Vec<Order>, ClientError> {
        let mut params = Vec::new();
        if let Some(contract) = contract {
            params.push(("contract", contract.to_string()));
        }
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }
        if let Some(source) = source {
            params.push(("helper", source.to_string()));
        }
        self.get("/orders", &params).await
    }

    /// Gets orders by client order id (batch).
    ///
    /// # Errors
    ///
    /// Returns an error if `client_oids` is empty or the request fails.
    pub async fn get_order_use_client_oid(
        &self,
        client_oids: &[&str],
    ) -> Result<Vec<Order>, ClientError> {
        let ids = join_ids(client_oids)?;
        self.get("/orders", &[("client_oid", ids)]).await
    }

    /// Gets orders by exchange order id (batch).
    ///
    /// # Errors
    ///
    /// Returns an error if `exchange_oids` is empty or the request fails.
    pub async fn get_order_use_exchange_oid(
        &self,
        exchange_oids: &[&str],
    ) -> Result<Vec<Order>, ClientError> {
        let ids = join_ids(exchange_oids)?;
        self.get("/orders", &[("exchange_oid", ids)]).await
    }

    /// Places an order.
    ///
    /// `POST /orders`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderAck, ClientError> {
        debug!(
            contract = %request.contract,
            price = %request.price,
            bs = %request.bs,
            amount = %request.amount,
            client_oid = ?request.client_oid,
            "place order"
        );
        self.post("/orders", request).await
    }

    /// Cancels orders by client order id (batch).
    ///
    /// `DELETE /orders?client_oid=a,b`
    ///
    /// # Errors
    ///
    /// Returns an error if `client_oids` is empty or the request fails.
    pub async fn cancel_use_client_oid(
        &self,
        client_oids: &[&str],
    ) -> Result<Vec<OrderAck>, ClientError> {
        let ids = join_ids(client_oids)?;
        debug!(client_oid = %ids, "cancel use client oid");
        self.delete("/orders", &[("client_oid", ids)]).await
    }

    /// Cancels orders by exchange order id (batch).
    ///
    /// # Errors
    ///
    /// Returns an error if `exchange_oids` is empty or the request fails.
    pub async fn cancel_use_exchange_oid(
        &self,
        exchange_oids: &[&str],
    ) -> Result<Vec<OrderAck>, ClientError> {
        let ids = join_ids(exchange_oids)?;
        debug!(exchange_oid = %ids, "cancel use exchange oid");
        self.delete("/orders", &[("exchange_oid", ids)]).await
    }

    /// Cancels every working order, optionally limited to one contract.
    ///
    /// `DELETE /orders/all`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn cancel_all(&self, contract: Option<&str>) -> Result<serde_json::Value, ClientError> {
        let params: Vec<(&str, String)> = contract
            .map(|c| ("contract", c.to_string()))
            .into_iter()
            .collect();
        self.delete("/orders/all", &params).await
    }

    /// Amends price and amount of an order addressed by client order id.
    ///
    /// `PATCH /orders?client_oid=..`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn amend_order_use_client_oid(
        &self,
        client_oid: &str,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderAck, ClientError> {
        let body = AmendOrderRequest { price, amount };
        self.patch("/orders", &[("client_oid", client_oid.to_string())], &body)
            .await
    }

    /// Amends price and amount of an order addressed by exchange order id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn amend_order_use_exchange_oid(
        &self,
        exchange_oid: &str,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderAck, ClientError> {
        let body = AmendOrderRequest { price, amount };
        self.patch("/orders", &[("exchange_oid", exchange_oid.to_string())], &body)
            .await
    }

    /// Places an order, waits, then cancels it by client order id.
    ///
    /// A client order id is generated when the request carries none.
    ///
    /// # Errors
    ///
    /// Returns the first failing call's error.
    pub async fn place_and_cancel(
        &self,
        request: PlaceOrderRequest,
        wait: Duration,
    ) -> Result<(OrderAck, Vec<OrderAck>), ClientError> {
        let client_oid = request
            .client_oid
            .clone()
            .unwrap_or_else(|| rand_client_oid(&request.contract));
        let request = request.with_client_oid(client_oid.clone());

        let placed = self.place_order(&request).await?;
        tokio::time::sleep(wait).await;
        let cancelled = self.cancel_use_client_oid(&[client_oid.as_str()]).await?;
        Ok((placed, cancelled))
    }

    /// Lists recent fills.
    ///
    /// `GET /trans`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_dealt_trans(
        &self,
        contract: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        self.dealt_trans(contract, None).await
    }

    /// Lists recent fills from the service's database.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_dealt_trans_from_db(
        &self,
        contract: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        self.dealt_trans(contract, Some(DB_SOURCE)).await
    }

    async fn dealt_trans(
        &self,
        contract: Option<&str>,
        source: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let mut params = Vec::new();
        if let Some(contract) = contract {
            params.push(("contract", contract.to_string()));
        }
        if let Some(source) = source {
            params.push(("helper", source.to_string()));
        }
        self.get("/trans", &params).await
    }
}

/// Joins a batch of ids with `,`.
fn join_ids(ids: &[&str]) -> Result<String, ClientError> {
    if ids.is_empty() {
        return Err(ClientError::InvalidRequest(
            "at least one id is required".to_string(),
        ));
    }
    Ok(ids.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&["a"]).expect("join"), "a");
        assert_eq!(join_ids(&["a", "b", "c"]).expect("join"), "a,b,c");
        assert!(matches!(join_ids(&[]), Err(ClientError::InvalidRequest(_))));
    }
}
