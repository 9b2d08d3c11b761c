//! Market-data session state machine.
//!
//! Same shape as the account [`SessionCore`](crate::ws::SessionCore): no
//! I/O, every input takes the current time and returns [`QuoteEffect`]s.
//! Authentication is an in-band `auth` request sent once the socket is
//! open; every subscription is sent again after it succeeds.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::config::QuoteConfig;
use super::messages::{QuotePush, QuoteRequest, QuoteSubscription, QuoteUpdate};
use crate::ws::dispatcher::decode_json;
use crate::ws::error::WsError;
use crate::ws::handler::QuoteHandler;
use crate::ws::machine::SessionState;

/// Side effects requested by [`QuoteCore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteEffect {
    /// Write a frame to the socket.
    Send(QuoteRequest),
    /// Start a connect attempt after the delay.
    Connect {
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Drop the current socket, if any, and cancel any attempt in flight.
    CloseSocket,
}

/// The market-data session lifecycle without I/O.
pub struct QuoteCore {
    state: SessionState,
    subscriptions: BTreeMap<QuoteSubscription, Vec<Box<dyn QuoteHandler>>>,
    last_pong: Option<Instant>,
    auth_deadline: Option<Instant>,
    backoff: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    auth_timeout: Duration,
    pong_timeout: Duration,
}

impl std::fmt::Debug for QuoteCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCore")
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.keys().collect::<Vec<_>>())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl QuoteCore {
    /// Creates an idle core.
    #[must_use]
    pub fn new(config: &QuoteConfig) -> Self {
        Self {
            state: SessionState::Idle,
            subscriptions: BTreeMap::new(),
            last_pong: None,
            auth_deadline: None,
            backoff: config.reconnect_delay,
            initial_backoff: config.reconnect_delay,
            max_backoff: config.max_reconnect_delay.max(config.reconnect_delay),
            auth_timeout: config.auth_timeout,
            pong_timeout: config.pong_timeout,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the active subscriptions in replay order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<QuoteSubscription> {
        self.subscriptions.keys().cloned().collect()
    }

    /// Returns when the pending `auth` wait expires.
    #[must_use]
    pub fn auth_deadline(&self) -> Option<Instant> {
        self.auth_deadline
    }

    /// Returns the delay the next reconnect will use.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.backoff
    }

    fn set_state(&mut self, to: SessionState, reason: &str) {
        if self.state != to {
            info!(from = %self.state, to = %to, reason, "quote session state changed");
            self.state = to;
        }
    }

    /// Adds a handler to a subscription. Only the first handler of a
    /// subscription puts a subscribe request on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub fn subscribe(
        &mut self,
        subscription: QuoteSubscription,
        handler: Box<dyn QuoteHandler>,
    ) -> Result<Vec<QuoteEffect>, WsError> {
        if self.state == SessionState::Closed {
            return Err(WsError::Closed);
        }
        let handlers = self.subscriptions.entry(subscription.clone()).or_default();
        let added = handlers.is_empty();
        handlers.push(handler);
        debug!(subscription = %subscription, added, "quote handler registered");

        Ok(match self.state {
            SessionState::Ready if added => vec![QuoteEffect::Send(QuoteRequest::Subscribe(
                subscription,
            ))],
            SessionState::Idle => {
                self.set_state(SessionState::GoingToConnect, "user subscribe");
                vec![QuoteEffect::Connect {
                    delay: Duration::ZERO,
                }]
            }
            _ => Vec::new(),
        })
    }

    /// Drops a subscription and its handlers. Releases the socket when
    /// nothing is left.
    pub fn unsubscribe(&mut self, subscription: &QuoteSubscription) -> Vec<QuoteEffect> {
        if self.state == SessionState::Closed || self.subscriptions.remove(subscription).is_none()
        {
            return Vec::new();
        }
        if !self.subscriptions.is_empty()
            || matches!(self.state, SessionState::Idle | SessionState::Closed)
        {
            return Vec::new();
        }
        self.set_state(SessionState::GoingToDisconnect, "subscribe nothing");
        self.auth_deadline = None;
        self.last_pong = None;
        self.backoff = self.initial_backoff;
        self.set_state(SessionState::Idle, "socket released");
        vec![QuoteEffect::CloseSocket]
    }

    /// Called when the reconnect delay elapsed.
    ///
    /// Returns true if a connect attempt should start now.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != SessionState::GoingToConnect {
            return false;
        }
        self.set_state(SessionState::Connecting, "connect attempt");
        true
    }

    /// Called when the socket handshake completed.
    ///
    /// Returns `None` if the socket is no longer wanted and must be dropped,
    /// otherwise the frames to send on it.
    pub fn on_socket_open(&mut self, now: Instant) -> Option<Vec<QuoteEffect>> {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "dropping socket opened in wrong state");
            return None;
        }
        self.auth_deadline = Some(now + self.auth_timeout);
        self.last_pong = Some(now);
        Some(vec![QuoteEffect::Send(QuoteRequest::Auth)])
    }

    /// Called when a connect attempt failed.
    pub fn on_connect_failed(&mut self, err: &WsError) -> Vec<QuoteEffect> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        warn!(error = %err, "quote connect attempt failed");
        self.reconnect(&err.to_string())
    }

    /// Called when the socket closed or errored on its own.
    pub fn on_socket_closed(&mut self, reason: &str) -> Vec<QuoteEffect> {
        match self.state {
            SessionState::Connecting | SessionState::Ready => {
                warn!(reason, "quote socket closed");
                self.reconnect(reason)
            }
            _ => Vec::new(),
        }
    }

    /// Heartbeat tick: pings, or declares the connection lost after
    /// `pong_timeout` without a pong.
    pub fn on_heartbeat(&mut self, now: Instant) -> Vec<QuoteEffect> {
        if self.state != SessionState::Ready {
            return Vec::new();
        }
        let silent = self
            .last_pong
            .map_or(true, |pong| now.saturating_duration_since(pong) > self.pong_timeout);
        if silent {
            warn!(error = %WsError::HeartbeatLost, "quote connection heartbeat lost");
            return self.reconnect("heartbeat lost");
        }
        vec![QuoteEffect::Send(QuoteRequest::Ping)]
    }

    /// `auth` wait expiry.
    pub fn on_auth_timeout(&mut self, now: Instant) -> Vec<QuoteEffect> {
        match self.auth_deadline {
            Some(deadline) if self.state == SessionState::Connecting && now >= deadline => {
                warn!("wait for auth success timeout");
                self.reconnect("auth timeout")
            }
            _ => Vec::new(),
        }
    }

    /// Routes one classified frame.
    pub fn on_push(&mut self, message: QuotePush, now: Instant) -> Vec<QuoteEffect> {
        match message {
            QuotePush::Pong => {
                self.last_pong = Some(now);
                Vec::new()
            }
            QuotePush::Auth => self.on_authorized(now),
            QuotePush::SubscribeAck(raw) => {
                info!(frame = %raw, "quote subscription acknowledged");
                Vec::new()
            }
            QuotePush::Update(update) => {
                self.dispatch(&update);
                Vec::new()
            }
            QuotePush::Other(raw) => {
                warn!(frame = %raw, "unknown quote message");
                Vec::new()
            }
        }
    }

    /// Decodes and routes one socket frame. Bad frames are logged and dropped.
    pub fn on_frame(&mut self, message: &Message, now: Instant) -> Vec<QuoteEffect> {
        match decode_json(message).and_then(|value| value.map(QuotePush::classify).transpose()) {
            Ok(Some(push)) => self.on_push(push, now),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "unexpected quote message format");
                Vec::new()
            }
        }
    }

    /// Stops the session for good. Subscriptions are kept for inspection.
    pub fn close(&mut self) -> Vec<QuoteEffect> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        self.auth_deadline = None;
        self.set_state(SessionState::Closed, "closed by user");
        vec![QuoteEffect::CloseSocket]
    }

    fn on_authorized(&mut self, now: Instant) -> Vec<QuoteEffect> {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "ignoring auth reply");
            return Vec::new();
        }
        self.auth_deadline = None;
        self.last_pong = Some(now);
        self.backoff = self.initial_backoff;
        self.set_state(SessionState::Ready, "auth passed");
        if !self.subscriptions.is_empty() {
            info!(count = self.subscriptions.len(), "recover subscriptions");
        }
        self.subscriptions
            .keys()
            .map(|subscription| QuoteEffect::Send(QuoteRequest::Subscribe(subscription.clone())))
            .collect()
    }

    fn dispatch(&self, update: &QuoteUpdate) {
        let Some(handlers) = self.subscriptions.get(&update.subscription) else {
            debug!(subscription = %update.subscription, "update without subscription");
            return;
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler.on_quote(update))).is_err() {
                error!(subscription = %update.subscription, "quote handler panicked");
            }
        }
    }

    fn reconnect(&mut self, reason: &str) -> Vec<QuoteEffect> {
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(self.max_backoff);
        self.auth_deadline = None;
        self.last_pong = None;
        self.set_state(SessionState::GoingToConnect, reason);
        vec![QuoteEffect::CloseSocket, QuoteEffect::Connect { delay }]
    }
}
