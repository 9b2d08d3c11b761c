//! Push session tests against an in-process WebSocket server.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{credentials, expected_signature, API_KEY, SYMBOL};
use futures_util::{SinkExt, StreamExt};
use onetoken_sdk::auth::{API_KEY_HEADER, API_NONCE_HEADER, API_SIGNATURE_HEADER};
use onetoken_sdk::types::{AccountInfo, Order};
use onetoken_sdk::ws::{AccountSession, SessionState, Topic, WsConfig, WsError};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const STEP: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

struct Handshake {
    path: String,
    headers: HeaderMap,
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> (ServerSocket, Handshake) {
    let (stream, _) = timeout(STEP, listener.accept())
        .await
        .expect("client connects in time")
        .expect("accept");
    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        *sink.lock().expect("lock") = Some(Handshake {
            path: request.uri().path().to_string(),
            headers: request.headers().clone(),
        });
        Ok(response)
    };
    let socket = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .expect("upgrade");
    let handshake = captured.lock().expect("lock").take().expect("handshake captured");
    (socket, handshake)
}

async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("server send");
}

/// Next non-ping client frame. Pings are answered with a pong.
async fn next_frame(socket: &mut ServerSocket) -> Value {
    loop {
        let message = timeout(STEP, socket.next())
            .await
            .expect("frame in time")
            .expect("socket open")
            .expect("valid frame");
        let Message::Text(text) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(text.as_str()).expect("client sends json");
        if value["uri"] == "ping" {
            send_json(socket, json!({"uri": "pong", "uuid": value["uuid"]})).await;
            continue;
        }
        return value;
    }
}

fn session_for(addr: SocketAddr) -> AccountSession {
    let config = WsConfig::new(format!("ws://{}", addr));
    assert_ok!(AccountSession::with_symbol(SYMBOL, credentials(), config))
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("header present")
}

#[tokio::test]
async fn test_signed_handshake_and_info_push() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);

    let (tx, mut infos) = mpsc::unbounded_channel::<AccountInfo>();
    assert_ok!(
        session
            .subscribe_info(move |info: &AccountInfo| {
                let _ = tx.send(info.clone());
            })
            .await
    );

    let (mut socket, handshake) = accept(&listener).await;
    assert_eq!(handshake.path, "/binance/otplay");
    let nonce: u64 = header(&handshake.headers, API_NONCE_HEADER)
        .parse()
        .expect("numeric nonce");
    assert_eq!(header(&handshake.headers, API_KEY_HEADER), API_KEY);
    assert_eq!(
        header(&handshake.headers, API_SIGNATURE_HEADER),
        expected_signature("GET", "/ws/otplay", nonce, "")
    );

    send_json(&mut socket, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"uri": "sub-info"}));
    assert_ok!(timeout(STEP, session.wait_for_state(SessionState::Ready)).await);

    send_json(
        &mut socket,
        json!({"uri": "info", "status": "ok", "data": {"balance": 42, "position": []}}),
    )
    .await;
    let info = timeout(STEP, infos.recv())
        .await
        .expect("info in time")
        .expect("handler called");
    assert_eq!(info.balance, Some(42.into()));

    assert_ok!(session.close().await);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.subscribed_topics(), vec![Topic::Info]);
}

#[tokio::test]
async fn test_order_push_routes_to_handler_and_queue() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);

    let (tx, mut updates) = mpsc::unbounded_channel::<Order>();
    assert_ok!(
        session
            .subscribe_orders(move |order: &Order| {
                let _ = tx.send(order.clone());
            })
            .await
    );

    let (mut socket, _) = accept(&listener).await;
    send_json(&mut socket, json!({"uri": "connection", "status": "connected"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"uri": "sub-order"}));

    // malformed frames in between must not break the receive loop
    socket
        .send(Message::Text("not json".into()))
        .await
        .expect("server send");
    send_json(&mut socket, json!({"uri": "order", "status": "error", "message": "x"})).await;
    send_json(
        &mut socket,
        json!({"uri": "order", "status": "ok", "data": [{"exchange_oid": "X1", "status": "open"}]}),
    )
    .await;

    let order = timeout(STEP, updates.recv())
        .await
        .expect("order in time")
        .expect("handler called");
    assert_eq!(order.exchange_oid, "X1");
    assert_eq!(order.status, "open");

    assert_eq!(
        assert_ok!(session.pending_order_ids().await),
        vec!["X1".to_string()]
    );
    let queued = assert_ok!(session.take_order_updates("X1").await);
    assert_eq!(queued, vec![order]);
    assert!(assert_ok!(session.take_order_updates("X1").await).is_empty());

    assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_reconnect_replays_every_topic_once() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);

    assert_ok!(session.subscribe_info(|_: &AccountInfo| {}).await);
    assert_ok!(session.subscribe_info_named("audit", |_: &AccountInfo| {}).await);
    assert_ok!(session.subscribe_order_queues().await);

    let (mut first, _) = accept(&listener).await;
    send_json(&mut first, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut first).await, json!({"uri": "sub-info"}));
    assert_eq!(next_frame(&mut first).await, json!({"uri": "sub-order"}));

    // drop the connection without a close handshake
    drop(first);

    let (mut second, _) = accept(&listener).await;
    assert_eq!(session.state(), SessionState::Connecting);
    send_json(&mut second, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut second).await, json!({"uri": "sub-info"}));
    assert_eq!(next_frame(&mut second).await, json!({"uri": "sub-order"}));

    // nothing else but pings may follow
    let extra = timeout(Duration::from_millis(300), next_frame(&mut second)).await;
    assert!(extra.is_err(), "unexpected frame {:?}", extra);

    assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_unsubscribe_last_topic_releases_connection() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);

    assert_ok!(session.subscribe_orders(|_: &Order| {}).await);
    let (mut socket, _) = accept(&listener).await;
    send_json(&mut socket, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"uri": "sub-order"}));
    assert_ok!(timeout(STEP, session.wait_for_state(SessionState::Ready)).await);

    assert_ok!(session.unsubscribe_orders().await);
    assert_eq!(next_frame_or_close(&mut socket).await, Some(json!({"uri": "unsub-order"})));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.subscribed_topics().is_empty());
    assert_eq!(next_frame_or_close(&mut socket).await, None);

    assert_ok!(session.close().await);
}

/// Like [`next_frame`] but returns `None` once the client closed.
async fn next_frame_or_close(socket: &mut ServerSocket) -> Option<Value> {
    loop {
        let message = timeout(STEP, socket.next()).await.expect("frame in time");
        match message {
            Some(Ok(Message::Text(text))) => {
                let value: Value = serde_json::from_str(text.as_str()).expect("json");
                if value["uri"] != "ping" {
                    return Some(value);
                }
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => {}
        }
    }
}

#[tokio::test]
async fn test_no_router_found_disables_push() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);
    let mut status = session.status();

    assert_ok!(session.subscribe_order_queues().await);
    let (mut socket, _) = accept(&listener).await;
    send_json(&mut socket, json!({"code": "no-router-found"})).await;

    assert_ok!(
        timeout(STEP, status.wait_for(|current| !current.push_supported)).await
    );
    assert!(!session.is_push_supported());
    assert_eq!(session.state(), SessionState::Idle);

    let result = session.subscribe_info(|_: &AccountInfo| {}).await;
    assert_eq!(result, Err(WsError::PushUnsupported));

    // no subscribe frame reaches the server
    assert_eq!(next_frame_or_close(&mut socket).await, None);
    assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_rejected_handshake_retries() {
    let (listener, addr) = bind().await;
    let session = session_for(addr);

    assert_ok!(session.subscribe_info(|_: &AccountInfo| {}).await);
    let (mut first, _) = accept(&listener).await;
    send_json(
        &mut first,
        json!({"uri": "connection", "code": "auth-failed", "message": "invalid signature"}),
    )
    .await;
    assert_eq!(next_frame_or_close(&mut first).await, None);

    let (mut second, _) = accept(&listener).await;
    send_json(&mut second, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut second).await, json!({"uri": "sub-info"}));

    assert_ok!(session.close().await);
    assert_ok!(session.close().await);
}

async fn wait_for_pending(session: &AccountSession, expected: &[&str]) {
    let expected: Vec<String> = expected.iter().map(|id| id.to_string()).collect();
    let reached = timeout(STEP, async {
        loop {
            if session.pending_order_ids().await.as_ref() == Ok(&expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "pending order ids never became {:?}", expected);
}

async fn ready_order_session(
    listener: &TcpListener,
    config: WsConfig,
) -> (AccountSession, ServerSocket) {
    let session = assert_ok!(AccountSession::with_symbol(SYMBOL, credentials(), config));
    assert_ok!(session.subscribe_order_queues().await);
    let (mut socket, _) = accept(listener).await;
    send_json(&mut socket, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"uri": "sub-order"}));
    (session, socket)
}

#[tokio::test]
async fn test_queued_updates_survive_close() {
    let (listener, addr) = bind().await;
    let (session, mut socket) =
        ready_order_session(&listener, WsConfig::new(format!("ws://{}", addr))).await;

    send_json(
        &mut socket,
        json!({"uri": "order", "data": [{"exchange_oid": "X1", "status": "open"}]}),
    )
    .await;
    wait_for_pending(&session, &["X1"]).await;

    assert_ok!(session.close().await);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.subscribed_topics(), vec![Topic::Order]);

    assert_eq!(
        assert_ok!(session.pending_order_ids().await),
        vec!["X1".to_string()]
    );
    let updates = assert_ok!(session.take_order_updates("X1").await);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, "open");
    assert!(assert_ok!(session.take_order_updates("X1").await).is_empty());
    assert_eq!(session.unsubscribe_orders().await, Err(WsError::Closed));
    assert_eq!(session.subscribed_topics(), vec![Topic::Order]);
}

#[tokio::test]
async fn test_missing_acknowledgement_triggers_reconnect() {
    let (listener, addr) = bind().await;
    let config =
        WsConfig::new(format!("ws://{}", addr)).with_auth_timeout(Duration::from_millis(200));
    let session = assert_ok!(AccountSession::with_symbol(SYMBOL, credentials(), config));
    assert_ok!(session.subscribe_info(|_: &AccountInfo| {}).await);

    // accept the socket but never acknowledge it
    let (mut first, _) = accept(&listener).await;
    assert_eq!(next_frame_or_close(&mut first).await, None);

    let (mut second, _) = accept(&listener).await;
    send_json(&mut second, json!({"uri": "connection", "code": "ok"})).await;
    assert_eq!(next_frame(&mut second).await, json!({"uri": "sub-info"}));
    assert_ok!(timeout(STEP, session.wait_for_state(SessionState::Ready)).await);

    assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_drained_order_queue_is_reaped() {
    let (listener, addr) = bind().await;
    let config = WsConfig::new(format!("ws://{}", addr))
        .with_order_queue_idle_timeout(Duration::from_millis(200))
        .with_order_queue_sweep_interval(Duration::from_millis(50));
    let (session, mut socket) = ready_order_session(&listener, config).await;

    send_json(
        &mut socket,
        json!({"uri": "order", "status": "ok", "data": [
            {"exchange_oid": "X1", "status": "dealt"},
            {"exchange_oid": "X2", "status": "open"}
        ]}),
    )
    .await;
    wait_for_pending(&session, &["X1", "X2"]).await;

    assert_eq!(assert_ok!(session.take_order_updates("X1").await).len(), 1);
    wait_for_pending(&session, &["X2"]).await;

    // an undrained queue is never reaped
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        assert_ok!(session.pending_order_ids().await),
        vec!["X2".to_string()]
    );

    assert_ok!(session.close().await);
}
