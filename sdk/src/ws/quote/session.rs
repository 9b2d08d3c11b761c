//! Market-data session task and its handle.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, info, warn};

use super::config::QuoteConfig;
use super::machine::{QuoteCore, QuoteEffect};
use super::messages::QuoteSubscription;
use crate::ws::error::WsError;
use crate::ws::handler::QuoteHandler;
use crate::ws::machine::SessionState;
use crate::ws::transport::{
    frame_or_close_reason, next_frame, now, sleep_until, tick, ConnectEvent, Frame, Transport,
};

/// Snapshot of a market-data session, published on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteStatus {
    /// Lifecycle state.
    pub state: SessionState,
    /// Active subscriptions.
    pub subscriptions: Vec<QuoteSubscription>,
}

impl Default for QuoteStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            subscriptions: Vec::new(),
        }
    }
}

enum Command {
    Subscribe {
        subscription: QuoteSubscription,
        handler: Box<dyn QuoteHandler>,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    Unsubscribe {
        subscription: QuoteSubscription,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a market-data push session.
///
/// The connection opens on the first subscription, authenticates with an
/// `auth` request, pings every few seconds and reconnects with backoff
/// when the server goes silent. Subscriptions survive reconnects.
#[derive(Debug, Clone)]
pub struct QuoteSession {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<QuoteStatus>,
}

impl QuoteSession {
    /// Starts an idle session task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidConfig`] if the configuration is invalid
    /// or no runtime is running.
    pub fn new(config: QuoteConfig) -> Result<Self, WsError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WsError::InvalidConfig(format!("no tokio runtime: {}", e)))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(QuoteStatus::default());
        let worker = QuoteWorker {
            core: QuoteCore::new(&config),
            transport: Transport::new(config.connect_timeout),
            config,
            commands: command_rx,
            status: status_tx,
            heartbeat: None,
        };
        info!(url = %worker.config.quote_host_ws, "quote session started");
        runtime.spawn(worker.run());

        Ok(Self {
            commands: command_tx,
            status: status_rx,
        })
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

    /// Adds a handler to a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn subscribe<H: QuoteHandler>(
        &self,
        subscription: QuoteSubscription,
        handler: H,
    ) -> Result<(), WsError> {
        let handler: Box<dyn QuoteHandler> = Box::new(handler);
        self.request(|reply| Command::Subscribe {
            subscription,
            handler,
            reply,
        })
        .await?
    }

    /// Subscribes to verbose ticks of a contract.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn subscribe_tick<H: QuoteHandler>(
        &self,
        contract: &str,
        handler: H,
    ) -> Result<(), WsError> {
        self.subscribe(QuoteSubscription::tick(contract), handler)
            .await
    }

    /// Subscribes to candles of a contract, e.g. duration `1m`.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn subscribe_candle<H: QuoteHandler>(
        &self,
        contract: &str,
        duration: &str,
        handler: H,
    ) -> Result<(), WsError> {
        self.subscribe(QuoteSubscription::candle(contract, duration), handler)
            .await
    }

    /// Drops a subscription and all of its handlers.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Closed`] after close.
    pub async fn unsubscribe(&self, subscription: &QuoteSubscription) -> Result<(), WsError> {
        let subscription = subscription.clone();
        self.request(|reply| Command::Unsubscribe {
            subscription,
            reply,
        })
        .await?
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Returns the active subscriptions. Still readable after close.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<QuoteSubscription> {
        self.status.borrow().subscriptions.clone()
    }

    /// Returns a receiver for status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<QuoteStatus> {
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

struct QuoteWorker {
    core: QuoteCore,
    config: QuoteConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<QuoteStatus>,
    transport: Transport,
    heartbeat: Option<Interval>,
}

impl QuoteWorker {
    async fn run(mut self) {
        while self.core.state() != SessionState::Closed {
            let auth_deadline = self.core.auth_deadline().map(Instant::from_std);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all quote session handles dropped");
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
                        let request = self
                            .config
                            .quote_host_ws
                            .as_str()
                            .into_client_request()
                            .map_err(WsError::from);
                        self.transport.connect(request);
                    }
                }
                () = sleep_until(auth_deadline) => {
                    let effects = self.core.on_auth_timeout(now());
                    self.apply(effects).await;
                }
            }

            self.sync_heartbeat();
            self.publish();
        }

        self.transport.release().await;
        self.publish();
        info!(url = %self.config.quote_host_ws, "quote session stopped");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Subscribe { reply, .. } | Command::Unsubscribe { reply, .. } => {
                    let _ = reply.send(Err(WsError::Closed));
                }
                Command::Close { reply } => {
                    let _ = reply.send(());
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                subscription,
                handler,
                reply,
            } => {
                let result = match self.core.subscribe(subscription, handler) {
                    Ok(effects) => {
                        self.apply(effects).await;
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                self.sync_heartbeat();
                self.publish();
                let _ = reply.send(result);
            }
            Command::Unsubscribe {
                subscription,
                reply,
            } => {
                let effects = self.core.unsubscribe(&subscription);
                self.apply(effects).await;
                self.sync_heartbeat();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Close { reply } => {
                let effects = self.core.close();
                self.apply(effects).await;
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    async fn handle_connect_event(&mut self, event: ConnectEvent) {
        match self.transport.accept(event) {
            Some(Ok(stream)) => {
                if let Some(effects) = self.core.on_socket_open(now()) {
                    self.transport.attach(stream);
                    info!(url = %self.config.quote_host_ws, "quote ws connected");
                    self.apply(effects).await;
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

    async fn apply(&mut self, effects: Vec<QuoteEffect>) {
        let mut pending = std::collections::VecDeque::from(effects);
        while let Some(effect) = pending.pop_front() {
            match effect {
                QuoteEffect::Send(request) => {
                    if let Err(err) = self.transport.send(request.to_json()).await {
                        warn!(error = %err, "quote send failed");
                        self.transport.detach();
                        pending.extend(self.core.on_socket_closed(&err.to_string()));
                    }
                }
                QuoteEffect::Connect { delay } => self.transport.schedule(delay),
                QuoteEffect::CloseSocket => self.transport.release().await,
            }
        }
    }

    fn sync_heartbeat(&mut self) {
        match (self.core.state(), self.heartbeat.is_some()) {
            (SessionState::Ready, false) => {
                let mut interval = tokio::time::interval(self.config.heartbeat_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(interval);
            }
            (SessionState::Ready, true) | (_, false) => {}
            (_, true) => self.heartbeat = None,
        }
    }

    fn publish(&self) {
        let next = QuoteStatus {
            state: self.core.state(),
            subscriptions: self.core.subscriptions(),
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
