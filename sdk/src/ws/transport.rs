//! Socket plumbing shared by the session tasks.
//!
//! [`Transport`] owns at most one socket plus the connect attempt that may
//! replace it. Connect attempts run on their own task and report back
//! over a channel tagged with an epoch; results from an attempt that was
//! cancelled in the meantime are discarded.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::error::WsError;

pub(super) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// One read from the socket.
pub(super) type Frame = Option<Result<Message, tokio_tungstenite::tungstenite::Error>>;

/// Upper bound on the graceful close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a connect attempt.
pub(super) struct ConnectEvent {
    epoch: u64,
    result: Result<WsStream, WsError>,
}

pub(super) struct Transport {
    pub(super) source: Option<WsSource>,
    pub(super) events: mpsc::UnboundedReceiver<ConnectEvent>,
    pub(super) reconnect_at: Option<Instant>,
    sink: Option<WsSink>,
    events_tx: mpsc::UnboundedSender<ConnectEvent>,
    connect_task: Option<JoinHandle<()>>,
    epoch: u64,
    connect_timeout: Duration,
}

impl Transport {
    pub(super) fn new(connect_timeout: Duration) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            source: None,
            events,
            reconnect_at: None,
            sink: None,
            events_tx,
            connect_task: None,
            epoch: 0,
            connect_timeout,
        }
    }

    /// Schedules the next connect attempt.
    pub(super) fn schedule(&mut self, delay: Duration) {
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Starts a connect attempt on its own task.
    pub(super) fn connect(&mut self, request: Result<Request, WsError>) {
        self.epoch += 1;
        let epoch = self.epoch;
        let timeout = self.connect_timeout;
        let events = self.events_tx.clone();
        debug!(epoch, "connecting");

        self.connect_task = Some(tokio::spawn(async move {
            let result = match request {
                Ok(request) => {
                    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
                        .await
                    {
                        Ok(Ok((stream, _response))) => Ok(stream),
                        Ok(Err(e)) => Err(WsError::Connection(e.to_string())),
                        Err(_) => Err(WsError::Connection("connect timeout".to_string())),
                    }
                }
                Err(e) => Err(e),
            };
            let _ = events.send(ConnectEvent { epoch, result });
        }));
    }

    /// Returns the result of the current attempt, or `None` for a stale one.
    pub(super) fn accept(&mut self, event: ConnectEvent) -> Option<Result<WsStream, WsError>> {
        if event.epoch != self.epoch {
            debug!(epoch = event.epoch, current = self.epoch, "ignoring stale connect result");
            return None;
        }
        self.connect_task = None;
        Some(event.result)
    }

    pub(super) fn attach(&mut self, stream: WsStream) {
        let (sink, source) = stream.split();
        self.sink = Some(sink);
        self.source = Some(source);
    }

    /// Forgets a socket that already failed.
    pub(super) fn detach(&mut self) {
        self.sink = None;
        self.source = None;
    }

    /// Writes a text frame. Without a socket the frame is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::SendFailed`] if the socket rejects the write.
    pub(super) async fn send(&mut self, text: String) -> Result<(), WsError> {
        let Some(sink) = self.sink.as_mut() else {
            debug!(frame = %text, "no socket, frame dropped");
            return Ok(());
        };
        debug!(frame = %text, "send");
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    /// Drops the socket and cancels any attempt or pending reconnect.
    pub(super) async fn release(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.epoch += 1;
        self.reconnect_at = None;
        self.source = None;
        if let Some(mut sink) = self.sink.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
                debug!("close handshake timed out");
            }
        }
    }
}

/// Splits a read into a data frame or the reason the socket is gone.
pub(super) fn frame_or_close_reason(frame: Frame) -> Result<Message, String> {
    match frame {
        Some(Ok(Message::Close(close))) => Err(close
            .map(|close| {
                format!(
                    "closed by server: {} {}",
                    u16::from(close.code),
                    close.reason.as_str()
                )
            })
            .unwrap_or_else(|| "closed by server".to_string())),
        Some(Ok(message)) => Ok(message),
        Some(Err(err)) => Err(WsError::from(err).to_string()),
        None => Err("stream ended".to_string()),
    }
}

pub(super) fn now() -> std::time::Instant {
    Instant::now().into_std()
}

pub(super) async fn next_frame(source: &mut Option<WsSource>) -> Frame {
    match source {
        Some(source) => source.next().await,
        None => std::future::pending().await,
    }
}

pub(super) async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub(super) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
