//! Push handler contracts.
//!
//! Handlers run on the session task, one message at a time. They should
//! return quickly; long work belongs on a channel or a spawned task.
//! A panicking handler is logged and does not affect other handlers.

use super::quote::QuoteUpdate;
use crate::types::{AccountInfo, Order};

/// Receives account info updates.
pub trait InfoHandler: Send + 'static {
    /// Called for every account info push.
    fn on_info(&self, info: &AccountInfo);
}

/// Receives order updates.
pub trait OrderHandler: Send + 'static {
    /// Called for every order update in a push batch.
    fn on_order_update(&self, order: &Order);
}

/// Receives market-data updates of one subscription.
pub trait QuoteHandler: Send + 'static {
    /// Called for every tick or candle update.
    fn on_quote(&self, update: &QuoteUpdate);
}

impl<F> InfoHandler for F
where
    F: Fn(&AccountInfo) + Send + 'static,
{
    fn on_info(&self, info: &AccountInfo) {
        self(info);
    }
}

impl<F> OrderHandler for F
where
    F: Fn(&Order) + Send + 'static,
{
    fn on_order_update(&self, order: &Order) {
        self(order);
    }
}

impl<F> QuoteHandler for F
where
    F: Fn(&QuoteUpdate) + Send + 'static,
{
    fn on_quote(&self, update: &QuoteUpdate) {
        self(update);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_closures_are_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let info_handler: Box<dyn InfoHandler> = Box::new(move |_: &AccountInfo| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        info_handler.on_info(&AccountInfo::default());

        let counter = Arc::clone(&calls);
        let order_handler: Box<dyn OrderHandler> = Box::new(move |order: &Order| {
            assert_eq!(order.exchange_oid, "X1");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let order: Order =
            serde_json::from_str(r#"{"exchange_oid":"X1","status":"pending"}"#).expect("order");
        order_handler.on_order_update(&order);

        let counter = Arc::clone(&calls);
        let quote_handler: Box<dyn QuoteHandler> = Box::new(move |update: &QuoteUpdate| {
            assert_eq!(update.data["last"], 1);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        quote_handler.on_quote(&QuoteUpdate {
            subscription: crate::ws::quote::QuoteSubscription::tick("huobip/btc.usdt"),
            data: serde_json::json!({"last": 1}),
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
