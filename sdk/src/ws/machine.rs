//! Session state machine.
//!
//! [`SessionCore`] owns the connection state, the subscription registry
//! and the heartbeat bookkeeping, but performs no I/O. Every input takes
//! the current time and returns the [`Effect`]s the session task has to
//! carry out, which keeps the whole lifecycle testable without a socket.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::handler::{InfoHandler, OrderHandler};
use super::messages::{ClientMessage, Topic};
use super::registry::{Registry, Removal};
use crate::types::Order;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No socket and nothing to connect for.
    Idle,
    /// Waiting to start the next connect attempt.
    GoingToConnect,
    /// Socket handshake in flight or waiting for the server's acknowledgement.
    Connecting,
    /// Authenticated; heartbeat running.
    Ready,
    /// Tearing down after the last subscription was removed.
    GoingToDisconnect,
    /// Closed by the application. Terminal.
    Closed,
}

impl SessionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GoingToConnect => "going-to-connect",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::GoingToDisconnect => "going-to-disconnect",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write a frame to the socket.
    Send(ClientMessage),
    /// Start a connect attempt after the delay.
    Connect {
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Drop the current socket, if any, and cancel any attempt in flight.
    CloseSocket,
}

/// The session lifecycle without I/O.
#[derive(Debug)]
pub struct SessionCore {
    pub(super) state: SessionState,
    pub(super) registry: Registry,
    pub(super) push_supported: bool,
    pub(super) last_ping: Option<Instant>,
    pub(super) last_pong: Option<Instant>,
    last_ping_uuid: u64,
    auth_deadline: Option<Instant>,
    backoff: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    auth_timeout: Duration,
    queue_idle_timeout: Duration,
}

impl SessionCore {
    /// Creates an idle core.
    #[must_use]
    pub fn new(config: &WsConfig) -> Self {
        let initial_backoff = config.initial_backoff();
        Self {
            state: SessionState::Idle,
            registry: Registry::new(config.order_queue_capacity),
            push_supported: true,
            last_ping: None,
            last_pong: None,
            last_ping_uuid: 0,
            auth_deadline: None,
            backoff: initial_backoff,
            initial_backoff,
            max_backoff: config.max_reconnect_delay.max(initial_backoff),
            auth_timeout: config.auth_timeout,
            queue_idle_timeout: config.order_queue_idle_timeout,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns false once the server reported that push is unsupported.
    #[must_use]
    pub fn is_push_supported(&self) -> bool {
        self.push_supported
    }

    /// Returns the active topics in replay order.
    #[must_use]
    pub fn active_topics(&self) -> Vec<Topic> {
        self.registry.active_topics()
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns when the pending acknowledgement wait expires.
    #[must_use]
    pub fn auth_deadline(&self) -> Option<Instant> {
        self.auth_deadline
    }

    /// Returns the delay the next reconnect will use.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.backoff
    }

    pub(super) fn set_state(&mut self, to: SessionState, reason: &str) {
        if self.state != to {
            info!(from = %self.state, to = %to, reason, "session state changed");
            self.state = to;
        }
    }

    fn ensure_subscribable(&self) -> Result<(), WsError> {
        if self.state == SessionState::Closed {
            return Err(WsError::Closed);
        }
        if !self.push_supported {
            warn!("push not supported for this account, subscribe ignored");
            return Err(WsError::PushUnsupported);
        }
        Ok(())
    }

    fn on_topic_added(&mut self, topic: Topic, activated: bool, reason: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.state {
            SessionState::Ready if activated => effects.push(Effect::Send(topic.subscribe())),
            SessionState::Idle => {
                self.set_state(SessionState::GoingToConnect, reason);
                effects.push(Effect::Connect {
                    delay: Duration::ZERO,
                });
            }
            _ => {}
        }
        effects
    }

    fn on_topic_removed(&mut self, topic: Topic, removal: Removal) -> Vec<Effect> {
        let mut effects = Vec::new();
        if removal == Removal::TopicRemoved && self.state == SessionState::Ready {
            effects.push(Effect::Send(topic.unsubscribe()));
        }
        if removal != Removal::Absent && self.registry.is_empty() {
            effects.extend(self.disconnect("subscribe nothing"));
        }
        effects
    }

    /// Registers a named info handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] once push was disabled and
    /// [`WsError::Closed`] after close.
    pub fn subscribe_info(
        &mut self,
        name: &str,
        handler: Box<dyn InfoHandler>,
    ) -> Result<Vec<Effect>, WsError> {
        self.ensure_subscribable()?;
        let activated = self.registry.add_info(name, handler);
        debug!(handler = name, activated, "info handler registered");
        Ok(self.on_topic_added(Topic::Info, activated, "user sub info"))
    }

    /// Removes a named info handler. Removing an unknown name is a no-op,
    /// and so is anything after close.
    pub fn unsubscribe_info(&mut self, name: &str) -> Vec<Effect> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        let removal = self.registry.remove_info(name);
        self.on_topic_removed(Topic::Info, removal)
    }

    /// Activates the order topic, optionally with a wildcard handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] once push was disabled and
    /// [`WsError::Closed`] after close.
    pub fn subscribe_orders(
        &mut self,
        handler: Option<Box<dyn OrderHandler>>,
    ) -> Result<Vec<Effect>, WsError> {
        self.ensure_subscribable()?;
        let activated = self.registry.add_orders(handler);
        Ok(self.on_topic_added(Topic::Order, activated, "user sub order"))
    }

    /// Deactivates the order topic. A no-op when it is not active or after
    /// close.
    pub fn unsubscribe_orders(&mut self) -> Vec<Effect> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        let removal = self.registry.remove_orders();
        self.on_topic_removed(Topic::Order, removal)
    }

    /// Drains the pending updates of one order.
    pub fn take_order_updates(&mut self, exchange_oid: &str) -> Vec<Order> {
        self.registry.take_order_updates(exchange_oid)
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
    /// Returns false if the socket is no longer wanted and must be dropped.
    pub fn on_socket_open(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "dropping socket opened in wrong state");
            return false;
        }
        self.auth_deadline = Some(now + self.auth_timeout);
        debug!("socket open, waiting for connection acknowledgement");
        true
    }

    /// Called when a connect attempt failed.
    pub fn on_connect_failed(&mut self, err: &WsError) -> Vec<Effect> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        warn!(error = %err, "connect attempt failed");
        self.reconnect(&err.to_string())
    }

    /// Called when the socket closed or errored on its own.
    pub fn on_socket_closed(&mut self, reason: &str) -> Vec<Effect> {
        match self.state {
            SessionState::Connecting | SessionState::Ready => {
                warn!(reason, "socket closed");
                self.reconnect(reason)
            }
            _ => Vec::new(),
        }
    }

    /// Heartbeat tick.
    ///
    /// Declares the connection lost when no pong arrived since the previous
    /// ping, otherwise sends the next ping.
    pub fn on_heartbeat(&mut self, now: Instant) -> Vec<Effect> {
        if self.state != SessionState::Ready {
            return Vec::new();
        }
        if let Some(ping) = self.last_ping {
            if self.last_pong.map_or(true, |pong| pong < ping) {
                warn!(error = %WsError::HeartbeatLost, "no pong since last ping");
                return self.reconnect("heartbeat lost");
            }
        }
        self.last_ping = Some(now);
        let uuid = self.next_ping_uuid();
        vec![Effect::Send(ClientMessage::Ping { uuid })]
    }

    /// Acknowledgement wait expiry.
    pub fn on_auth_timeout(&mut self, now: Instant) -> Vec<Effect> {
        match self.auth_deadline {
            Some(deadline) if self.state == SessionState::Connecting && now >= deadline => {
                warn!(error = %WsError::AuthFailed("acknowledgement timeout".to_string()), "auth wait expired");
                self.reconnect("auth timeout")
            }
            _ => Vec::new(),
        }
    }

    /// Reaps idle order queues.
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        self.registry.sweep(now, self.queue_idle_timeout)
    }

    /// Stops the session for good. The registry is kept for inspection.
    pub fn close(&mut self) -> Vec<Effect> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        self.auth_deadline = None;
        self.set_state(SessionState::Closed, "closed by user");
        vec![Effect::CloseSocket]
    }

    /// Moves to ready after a positive acknowledgement and replays every
    /// active topic.
    pub(super) fn on_accepted(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "ignoring connection acknowledgement");
            return Vec::new();
        }
        self.auth_deadline = None;
        self.last_ping = None;
        self.last_pong = None;
        self.backoff = self.initial_backoff;
        self.set_state(SessionState::Ready, "connected and auth passed");
        self.registry
            .active_topics()
            .into_iter()
            .map(|topic| Effect::Send(topic.subscribe()))
            .collect()
    }

    /// Handles a negative acknowledgement.
    pub(super) fn on_rejected(&mut self, reason: &str) -> Vec<Effect> {
        match self.state {
            SessionState::Connecting | SessionState::Ready => {
                warn!(error = %WsError::AuthFailed(reason.to_string()), "connection rejected");
                self.reconnect(reason)
            }
            _ => Vec::new(),
        }
    }

    /// Disables push for the lifetime of the session.
    pub(super) fn disable_push(&mut self) -> Vec<Effect> {
        if !self.push_supported {
            return Vec::new();
        }
        warn!(error = %WsError::PushUnsupported, "disabling push for this session");
        self.push_supported = false;
        self.auth_deadline = None;
        match self.state {
            SessionState::Closed | SessionState::Idle => Vec::new(),
            _ => {
                self.set_state(SessionState::Idle, "push not supported");
                vec![Effect::CloseSocket]
            }
        }
    }

    fn reconnect(&mut self, reason: &str) -> Vec<Effect> {
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(self.max_backoff);
        self.auth_deadline = None;
        self.last_ping = None;
        self.last_pong = None;
        self.set_state(SessionState::GoingToConnect, reason);
        debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnect scheduled");
        vec![Effect::CloseSocket, Effect::Connect { delay }]
    }

    fn disconnect(&mut self, reason: &str) -> Vec<Effect> {
        if matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return Vec::new();
        }
        self.set_state(SessionState::GoingToDisconnect, reason);
        self.auth_deadline = None;
        self.last_ping = None;
        self.last_pong = None;
        self.backoff = self.initial_backoff;
        self.set_state(SessionState::Idle, "socket released");
        vec![Effect::CloseSocket]
    }

    fn next_ping_uuid(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
        self.last_ping_uuid = now.max(self.last_ping_uuid.saturating_add(1));
        self.last_ping_uuid
    }
}
