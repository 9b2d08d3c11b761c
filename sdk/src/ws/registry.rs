//! Subscription registry.
//!
//! Holds the handlers of each topic and the per-order update queues. The
//! registry is the source of truth for what the server should be
//! subscribed to: a topic is active iff it has an entry here. It is owned
//! by the session task, so none of this needs locking.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::handler::{InfoHandler, OrderHandler};
use super::messages::Topic;
use crate::types::{AccountInfo, Order};

/// Name used for info handlers registered without one.
pub const DEFAULT_HANDLER_NAME: &str = "default";

/// Key of the catch-all order handler.
pub const WILDCARD_KEY: &str = "*";

/// Result of removing a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Nothing was registered under that key.
    Absent,
    /// Removed; the topic still has other handlers.
    Kept,
    /// Removed the last handler; the topic is gone.
    TopicRemoved,
}

/// Pending updates of one order, drained by the application.
#[derive(Debug)]
struct OrderQueue {
    updates: VecDeque<Order>,
    last_update: Instant,
}

impl OrderQueue {
    fn new(now: Instant) -> Self {
        Self {
            updates: VecDeque::new(),
            last_update: now,
        }
    }
}

#[derive(Default)]
struct OrderTopic {
    wildcard: Option<Box<dyn OrderHandler>>,
    queues: HashMap<String, OrderQueue>,
}

/// Handlers and queues per topic.
pub struct Registry {
    info: Option<BTreeMap<String, Box<dyn InfoHandler>>>,
    orders: Option<OrderTopic>,
    queue_capacity: usize,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "info",
                &self.info.as_ref().map(|handlers| handlers.keys().collect::<Vec<_>>()),
            )
            .field(
                "orders",
                &self.orders.as_ref().map(|topic| {
                    (
                        topic.wildcard.is_some(),
                        topic.queues.keys().collect::<Vec<_>>(),
                    )
                }),
            )
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            info: None,
            orders: None,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Returns true if no topic is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.orders.is_none()
    }

    /// Returns true if the topic is active.
    #[must_use]
    pub fn is_active(&self, topic: Topic) -> bool {
        match topic {
            Topic::Info => self.info.is_some(),
            Topic::Order => self.orders.is_some(),
        }
    }

    /// Returns the active topics in replay order.
    #[must_use]
    pub fn active_topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|topic| self.is_active(*topic))
            .collect()
    }

    /// Returns the registered info handler names.
    #[must_use]
    pub fn info_handler_names(&self) -> Vec<String> {
        self.info
            .as_ref()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Registers an info handler, replacing any handler of the same name.
    ///
    /// Returns true if the topic was inactive before.
    pub fn add_info(&mut self, name: &str, handler: Box<dyn InfoHandler>) -> bool {
        let activated = self.info.is_none();
        self.info
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), handler);
        activated
    }

    /// Removes an info handler.
    pub fn remove_info(&mut self, name: &str) -> Removal {
        let Some(handlers) = self.info.as_mut() else {
            return Removal::Absent;
        };
        if handlers.remove(name).is_none() {
            return Removal::Absent;
        }
        if handlers.is_empty() {
            self.info = None;
            Removal::TopicRemoved
        } else {
            Removal::Kept
        }
    }

    /// Activates the order topic, optionally installing the wildcard handler.
    ///
    /// Returns true if the topic was inactive before.
    pub fn add_orders(&mut self, handler: Option<Box<dyn OrderHandler>>) -> bool {
        let activated = self.orders.is_none();
        let topic = self.orders.get_or_insert_with(OrderTopic::default);
        if handler.is_some() {
            topic.wildcard = handler;
        }
        activated
    }

    /// Deactivates the order topic, dropping the wildcard handler and every queue.
    pub fn remove_orders(&mut self) -> Removal {
        match self.orders.take() {
            Some(_) => Removal::TopicRemoved,
            None => Removal::Absent,
        }
    }

    /// Fans an info update out to every info handler.
    ///
    /// Returns the number of handlers that completed.
    pub fn dispatch_info(&self, info: &AccountInfo) -> usize {
        let Some(handlers) = self.info.as_ref() else {
            debug!("info update without info handlers");
            return 0;
        };
        handlers
            .iter()
            .filter(|(name, handler)| {
                let completed = catch_unwind(AssertUnwindSafe(|| handler.on_info(info))).is_ok();
                if !completed {
                    error!(handler = %name, "info handler panicked");
                }
                completed
            })
            .count()
    }

    /// Queues each order under its exchange order id, then hands it to the
    /// wildcard handler.
    ///
    /// Updates are ignored while the order topic is inactive.
    pub fn dispatch_orders(&mut self, orders: Vec<Order>, now: Instant) {
        let capacity = self.queue_capacity;
        let Some(topic) = self.orders.as_mut() else {
            debug!(count = orders.len(), "order update without order subscription");
            return;
        };

        for order in orders {
            debug!(exchange_oid = %order.exchange_oid, status = %order.status, "order update");

            if let Some(handler) = topic.wildcard.as_ref() {
                if catch_unwind(AssertUnwindSafe(|| handler.on_order_update(&order))).is_err() {
                    error!(exchange_oid = %order.exchange_oid, "order handler panicked");
                }
            }

            let queue = topic
                .queues
                .entry(order.exchange_oid.clone())
                .or_insert_with(|| OrderQueue::new(now));
            if queue.updates.len() >= capacity {
                queue.updates.pop_front();
                warn!(exchange_oid = %order.exchange_oid, capacity, "order queue full, dropped oldest update");
            }
            queue.last_update = now;
            queue.updates.push_back(order);
        }
    }

    /// Drains the pending updates of one order, oldest first.
    pub fn take_order_updates(&mut self, exchange_oid: &str) -> Vec<Order> {
        self.orders
            .as_mut()
            .and_then(|topic| topic.queues.get_mut(exchange_oid))
            .map(|queue| queue.updates.drain(..).collect())
            .unwrap_or_default()
    }

    /// Returns the exchange order ids that currently have a queue.
    #[must_use]
    pub fn pending_order_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .orders
            .as_ref()
            .map(|topic| topic.queues.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of queued updates for one order.
    #[must_use]
    pub fn queued_len(&self, exchange_oid: &str) -> usize {
        self.orders
            .as_ref()
            .and_then(|topic| topic.queues.get(exchange_oid))
            .map_or(0, |queue| queue.updates.len())
    }

    /// Drops queues that are drained and have seen no update for `idle`.
    ///
    /// Returns the removed exchange order ids.
    pub fn sweep(&mut self, now: Instant, idle: Duration) -> Vec<String> {
        let Some(topic) = self.orders.as_mut() else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        topic.queues.retain(|exchange_oid, queue| {
            let stale = queue.updates.is_empty()
                && now.saturating_duration_since(queue.last_update) >= idle;
            if stale {
                removed.push(exchange_oid.clone());
            }
            !stale
        });
        if !removed.is_empty() {
            debug!(count = removed.len(), "reaped idle order queues");
        }
        removed
    }
}
