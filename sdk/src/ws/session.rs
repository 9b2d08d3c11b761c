//! Push session task and its handle.
//!
//! One spawned task owns the socket, the [`SessionCore`] and every timer.
//! [`AccountSession`] is a cheap clonable handle that talks to that task
//! over a command channel, so nothing here is shared behind a lock.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::handler::{InfoHandler, OrderHandler};
use super::machine::{Effect, SessionCore, SessionState};
use super::messages::{ClientMessage, Topic};
use super::registry::DEFAULT_HANDLER_NAME;
use super::transport::{
    frame_or_close_reason, next_frame, now, sleep_until, tick, ConnectEvent, Frame, Transport,
};
use crate::auth::{Credentials, RequestSigner};
use crate::error::SdkError;
use crate::types::{AccountSymbol, Order};

/// Snapshot of a session, published on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: SessionState,
    /// False once the exchange reported no push support.
    pub push_supported: bool,
    /// Active topics.
    pub topics: Vec<Topic>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            push_supported: true,
            topics: Vec::new(),
        }
    }
}

enum Command {
    SubscribeInfo {
        name: String,
        handler: Box<dyn InfoHandler>,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    UnsubscribeInfo {
        name: String,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    SubscribeOrders {
        handler: Option<Box<dyn OrderHandler>>,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    UnsubscribeOrders {
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    TakeOrderUpdates {
        exchange_oid: String,
        reply: oneshot::Sender<Vec<Order>>,
    },
    PendingOrderIds {
        reply: oneshot::Sender<Vec<String>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a push session for one account.
///
/// Subscribing while idle starts the connection; removing the last
/// subscription releases it. Reconnects after heartbeat loss, transport
/// errors or rejected handshakes are automatic and replay every active
/// topic. Dropping every handle closes the session.
#[derive(Debug, Clone)]
pub struct AccountSession {
    symbol: AccountSymbol,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl AccountSession {
    /// Starts an idle session task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidConfig`] if the configuration or the
    /// credentials are invalid, or if no runtime is running.
    pub fn new(
        symbol: AccountSymbol,
        credentials: Arc<Credentials>,
        config: WsConfig,
    ) -> Result<Self, WsError> {
        config.validate()?;
        credentials
            .validate()
            .map_err(|e| WsError::InvalidConfig(e.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WsError::InvalidConfig(format!("no tokio runtime: {}", e)))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let worker = SessionWorker {
            core: SessionCore::new(&config),
            url: config.session_url(symbol.exchange(), symbol.account()),
            sign_path: symbol.ws_sign_path(),
            signer: RequestSigner::new(credentials),
            transport: Transport::new(config.connect_timeout),
            config,
            commands: command_rx,
            status: status_tx,
            heartbeat: None,
        };
        info!(symbol = %symbol, url = %worker.url, "push session started");
        runtime.spawn(worker.run());

        Ok(Self {
            symbol,
            commands: command_tx,
            status: status_rx,
        })
    }

    /// Starts a session from an `exchange/account` symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol or configuration is invalid.
    pub fn with_symbol(
        symbol: &str,
        credentials: Arc<Credentials>,
        config: WsConfig,
    ) -> Result<Self, SdkError> {
        Ok(Self::new(symbol.parse()?, credentials, config)?)
    }

    /// Returns the account this session serves.
    #[must_use]
    pub fn symbol(&self) -> &AccountSymbol {
        &self.symbol
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, WsError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| WsError::Closed)?;
        response.await.map_err(|_| WsError::Closed)
    }

    /// Registers the default info handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] if the exchange has no push
    /// support, or [`WsError::Closed`] after close.
    pub async fn subscribe_info<H: InfoHandler>(&self, handler: H) -> Result<(), WsError> {
        self.subscribe_info_named(DEFAULT_HANDLER_NAME, handler)
            .await
    }

    /// Registers a named info handler, replacing one of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] if the exchange has no push
    /// support, or [`WsError::Closed`] after close.
    pub async fn subscribe_info_named<H: InfoHandler>(
        &self,
        name: &str,
        handler: H,
    ) -> Result<(), WsError> {
        let name = name.to_string();
        self.request(|reply| Command::SubscribeInfo {
            name,
            handler: Box::new(handler),
            reply,
        })
        .await?
    }

    /// Removes the default info handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn unsubscribe_info(&self) -> Result<(), WsError> {
        self.unsubscribe_info_named(DEFAULT_HANDLER_NAME).await
    }

    /// Removes a named info handler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn unsubscribe_info_named(&self, name: &str) -> Result<(), WsError> {
        let name = name.to_string();
        self.request(|reply| Command::UnsubscribeInfo { name, reply })
            .await?
    }

    /// Subscribes to order updates with a handler called for every update.
    ///
    /// Updates are also queued per exchange order id; see
    /// [`take_order_updates`](Self::take_order_updates).
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] if the exchange has no push
    /// support, or [`WsError::Closed`] after close.
    pub async fn subscribe_orders<H: OrderHandler>(&self, handler: H) -> Result<(), WsError> {
        let handler: Box<dyn OrderHandler> = Box::new(handler);
        self.request(|reply| Command::SubscribeOrders {
            handler: Some(handler),
            reply,
        })
        .await?
    }

    /// Subscribes to order updates for queue consumption only.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::PushUnsupported`] if the exchange has no push
    /// support, or [`WsError::Closed`] after close.
    pub async fn subscribe_order_queues(&self) -> Result<(), WsError> {
        self.request(|reply| Command::SubscribeOrders {
            handler: None,
            reply,
        })
        .await?
    }

    /// Unsubscribes from order updates and drops every order queue.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn unsubscribe_orders(&self) -> Result<(), WsError> {
        self.request(|reply| Command::UnsubscribeOrders { reply })
            .await?
    }

    /// Drains the queued updates of one order, oldest first. Still works
    /// after close.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] if the session task is gone.
    pub async fn take_order_updates(&self, exchange_oid: &str) -> Result<Vec<Order>, WsError> {
        let exchange_oid = exchange_oid.to_string();
        self.request(|reply| Command::TakeOrderUpdates {
            exchange_oid,
            reply,
        })
        .await
    }

    /// Returns the exchange order ids that currently have a queue. Still
    /// works after close.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] if the session task is gone.
    pub async fn pending_order_ids(&self) -> Result<Vec<String>, WsError> {
        self.request(|reply| Command::PendingOrderIds { reply })
            .await
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Returns false once the exchange reported no push support.
    #[must_use]
    pub fn is_push_supported(&self) -> bool {
        self.status.borrow().push_supported
    }

    /// Returns the active topics. Still readable after close.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.status.borrow().topics.clone()
    }

    /// Returns a receiver for status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Waits until the session reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] if the session task ends first.
    pub async fn wait_for_state(&self, state: SessionState) -> Result<(), WsError> {
        let mut status = self.status.clone();
        status
            .wait_for(|current| current.state == state)
            .await
            .map(|_| ())
            .map_err(|_| WsError::Closed)
    }

    /// Closes the session for good. Calling it again is a no-op.
    ///
    /// The registry is kept, so [`subscribed_topics`](Self::subscribed_topics)
    /// still reports what was subscribed and queued order updates can still
    /// be drained with [`take_order_updates`](Self::take_order_updates).
    ///
    /// # Errors
    ///
    /// Never fails today; the result is kept for forward compatibility.
    pub async fn close(&self) -> Result<(), WsError> {
        match self.request(|reply| Command::Close { reply }).await {
            Ok(()) | Err(WsError::Closed) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Builds the signed upgrade request.
fn handshake_request(
    url: &str,
    sign_path: &str,
    signer: &RequestSigner,
) -> Result<Request, WsError> {
    let mut request = url.into_client_request()?;
    let signed = signer.signed_headers("GET", sign_path, "");
    for (name, value) in signed.pairs() {
        let value =
            HeaderValue::from_str(value).map_err(|e| WsError::InvalidConfig(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

struct SessionWorker {
    core: SessionCore,
    config: WsConfig,
    url: String,
    sign_path: String,
    signer: RequestSigner,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SessionStatus>,
    transport: Transport,
    heartbeat: Option<Interval>,
}

impl SessionWorker {
    async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.config.order_queue_sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.core.state() != SessionState::Closed {
            let auth_deadline = self.core.auth_deadline().map(Instant::from_std);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all session handles dropped");
                        let effects = self.core.close();
                        self.apply(effects).await;
                    }
                },
                Some(event) = self.transport.events.recv() => self.handle_connect_event(event).await,
                frame = next_frame(&mut self.transport.source) => self.handle_frame(frame).await,
                () = tick(&mut self.heartbeat) => {
                    let effects = self.core.on_heartbeat(now());
                    self.apply(effects).await;
                }
                () = sleep_until(self.transport.reconnect_at) => {
                    self.transport.reconnect_at = None;
                    if self.core.begin_connect() {
                        self.transport.connect(handshake_request(
                            &self.url,
                            &self.sign_path,
                            &self.signer,
                        ));
                    }
                }
                () = sleep_until(auth_deadline) => {
                    let effects = self.core.on_auth_timeout(now());
                    self.apply(effects).await;
                }
                _ = sweep.tick() => {
                    self.core.sweep(now());
                }
            }

            self.sync_heartbeat();
            self.publish();
        }

        self.transport.release().await;
        self.publish();
        info!(url = %self.url, "push session stopped");

        // registrations and queued updates stay readable until every handle is gone
        while let Some(command) = self.commands.recv().await {
            self.handle_closed_command(command);
        }
    }

    fn handle_closed_command(&mut self, command: Command) {
        match command {
            Command::SubscribeInfo { reply, .. }
            | Command::UnsubscribeInfo { reply, .. }
            | Command::SubscribeOrders { reply, .. }
            | Command::UnsubscribeOrders { reply } => {
                let _ = reply.send(Err(WsError::Closed));
            }
            Command::TakeOrderUpdates {
                exchange_oid,
                reply,
            } => {
                let _ = reply.send(self.core.take_order_updates(&exchange_oid));
            }
            Command::PendingOrderIds { reply } => {
                let _ = reply.send(self.core.registry().pending_order_ids());
            }
            Command::Close { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SubscribeInfo {
                name,
                handler,
                reply,
            } => {
                let result = self.core.subscribe_info(&name, handler);
                let result = self.complete(result).await;
                let _ = reply.send(result);
            }
            Command::UnsubscribeInfo { name, reply } => {
                let effects = self.core.unsubscribe_info(&name);
                let result = self.complete(Ok(effects)).await;
                let _ = reply.send(result);
            }
            Command::SubscribeOrders { handler, reply } => {
                let result = self.core.subscribe_orders(handler);
                let result = self.complete(result).await;
                let _ = reply.send(result);
            }
            Command::UnsubscribeOrders { reply } => {
                let effects = self.core.unsubscribe_orders();
                let result = self.complete(Ok(effects)).await;
                let _ = reply.send(result);
            }
            Command::TakeOrderUpdates {
                exchange_oid,
                reply,
            } => {
                let _ = reply.send(self.core.take_order_updates(&exchange_oid));
            }
            Command::PendingOrderIds { reply } => {
                let _ = reply.send(self.core.registry().pending_order_ids());
            }
            Command::Close { reply } => {
                let effects = self.core.close();
                self.apply(effects).await;
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    /// Applies the effects and publishes the new status before the caller
    /// gets its reply.
    async fn complete(&mut self, result: Result<Vec<Effect>, WsError>) -> Result<(), WsError> {
        let effects = result?;
        self.apply(effects).await;
        self.sync_heartbeat();
        self.publish();
        Ok(())
    }

    async fn handle_connect_event(&mut self, event: ConnectEvent) {
        match self.transport.accept(event) {
            Some(Ok(stream)) => {
                if self.core.on_socket_open(now()) {
                    self.transport.attach(stream);
                    info!(url = %self.url, "ws connected");
                }
            }
            Some(Err(err)) => {
                let effects = self.core.on_connect_failed(&err);
                self.apply(effects).await;
            }
            None => {}
        }
    }

    async fn handle_frame(&mut self, frame: Frame) {
        match frame_or_close_reason(frame) {
            Ok(message) => {
                let effects = self.core.on_frame(&message, now());
                self.apply(effects).await;
            }
            Err(reason) => {
                self.transport.detach();
                let effects = self.core.on_socket_closed(&reason);
                self.apply(effects).await;
            }
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut pending = std::collections::VecDeque::from(effects);
        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::Send(message) => {
                    if let Err(err) = self.send(&message).await {
                        warn!(error = %err, "send failed");
                        self.transport.detach();
                        pending.extend(self.core.on_socket_closed(&err.to_string()));
                    }
                }
                Effect::Connect { delay } => self.transport.schedule(delay),
                Effect::CloseSocket => self.transport.release().await,
            }
        }
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), WsError> {
        self.transport.send(message.to_json()?).await
    }

    fn sync_heartbeat(&mut self) {
        match (self.core.state(), self.heartbeat.is_some()) {
            (SessionState::Ready, false) => {
                let mut interval = tokio::time::interval(self.config.heartbeat_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(interval);
            }
            (SessionState::Ready, true) => {}
            (_, true) => self.heartbeat = None,
            (_, false) => {}
        }
    }

    fn publish(&self) {
        let next = SessionStatus {
            state: self.core.state(),
            push_supported: self.core.is_push_supported(),
            topics: self.core.active_topics(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
