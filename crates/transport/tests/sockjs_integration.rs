//! Integration test: connectors <-> SockJS echo server
//!
//! Spins up an axum server on a random port that speaks the server side of
//! SockJS (websocket and xhr-streaming) and echoes every message back.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{
    Path, State,
    ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::{SinkExt, StreamExt, stream};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use geotrackr_transport::{
    Connector, FallbackConnector, TransportEvent, TransportHandle, TransportKind, Url,
    WebSocketConnector, XhrStreamingConnector,
};

#[derive(Clone, Default)]
struct EchoState {
    streams: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

fn frame(messages: &[String]) -> String {
    format!("a{}", serde_json::to_string(messages).unwrap())
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(echo_socket)
}

async fn echo_socket(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    if sender.send(WsMessage::Text("o".into())).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = receiver.next().await {
        let WsMessage::Text(text) = msg else { continue };
        let Ok(messages) = serde_json::from_str::<Vec<String>>(text.as_str()) else {
            continue;
        };
        let reply = if messages.iter().any(|m| m == "bye") {
            r#"c[3000,"Go away!"]"#.to_string()
        } else {
            frame(&messages)
        };
        if sender.send(WsMessage::Text(reply.into())).await.is_err() {
            break;
        }
    }
}

async fn xhr_streaming(
    State(state): State<EchoState>,
    Path((_server, session)): Path<(String, String)>,
) -> Response {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    state.streams.lock().insert(session, tx);

    let opening = format!("{}\no\n", "h".repeat(2048));
    let frames = stream::unfold(rx, |mut rx| async move {
        let line = rx.recv().await?;
        Some((Ok::<_, Infallible>(format!("{}\n", line)), rx))
    });
    let body = stream::once(async move { Ok::<_, Infallible>(opening) }).chain(frames);

    Response::builder()
        .header("content-type", "application/javascript;charset=UTF-8")
        .body(Body::from_stream(body))
        .unwrap()
}

async fn xhr_send(
    State(state): State<EchoState>,
    Path((_server, session)): Path<(String, String)>,
    body: String,
) -> StatusCode {
    let Ok(messages) = serde_json::from_str::<Vec<String>>(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    match state.streams.lock().get(&session) {
        Some(tx) => {
            let _ = tx.send(frame(&messages));
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Start an echo server; returns the SockJS endpoint URL
async fn start_server(with_websocket: bool) -> Url {
    let mut app = Router::new()
        .route("/ws/location/{server}/{session}/xhr_streaming", post(xhr_streaming))
        .route("/ws/location/{server}/{session}/xhr_send", post(xhr_send));
    if with_websocket {
        app = app.route("/ws/location/{server}/{session}/websocket", get(ws_handler));
    }
    let app = app.with_state(EchoState::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{}/ws/location", addr)).unwrap()
}

async fn expect_message(handle: &mut TransportHandle) -> String {
    match timeout(Duration::from_secs(5), handle.recv()).await {
        Ok(TransportEvent::Message(text)) => text,
        other => panic!("expected message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_websocket_echo() {
    let _ = env_logger::try_init();
    let endpoint = start_server(true).await;

    let connector = WebSocketConnector::new(Duration::from_secs(5));
    let mut handle = connector.open(&endpoint).await.unwrap();
    assert_eq!(handle.kind(), TransportKind::WebSocket);

    let stomp = "SEND\ndestination:/app/location/update\n\n{}\0".to_string();
    handle.send(stomp.clone()).await.unwrap();
    assert_eq!(expect_message(&mut handle).await, stomp);
}

#[tokio::test]
async fn test_websocket_server_close() {
    let _ = env_logger::try_init();
    let endpoint = start_server(true).await;

    let connector = WebSocketConnector::default();
    let mut handle = connector.open(&endpoint).await.unwrap();
    handle.send("bye".to_string()).await.unwrap();

    let event = timeout(Duration::from_secs(5), handle.recv()).await.unwrap();
    assert_eq!(
        event,
        TransportEvent::Closed {
            code: Some(3000),
            reason: "Go away!".to_string()
        }
    );
}

#[tokio::test]
async fn test_xhr_streaming_echo() {
    let _ = env_logger::try_init();
    let endpoint = start_server(false).await;

    let connector = XhrStreamingConnector::new(Duration::from_secs(5));
    let mut handle = connector.open(&endpoint).await.unwrap();
    assert_eq!(handle.kind(), TransportKind::XhrStreaming);

    handle.send("first".to_string()).await.unwrap();
    handle.send("second".to_string()).await.unwrap();
    assert_eq!(expect_message(&mut handle).await, "first");
    assert_eq!(expect_message(&mut handle).await, "second");
}

#[tokio::test]
async fn test_fallback_when_upgrade_unavailable() {
    let _ = env_logger::try_init();
    let endpoint = start_server(false).await;

    let connector = FallbackConnector::sockjs(Duration::from_secs(2));
    let mut handle = connector.open(&endpoint).await.unwrap();
    assert_eq!(handle.kind(), TransportKind::XhrStreaming);

    handle.send("over http".to_string()).await.unwrap();
    assert_eq!(expect_message(&mut handle).await, "over http");
}

#[tokio::test]
async fn test_fallback_prefers_websocket() {
    let _ = env_logger::try_init();
    let endpoint = start_server(true).await;

    let connector = FallbackConnector::sockjs(Duration::from_secs(2));
    let handle = connector.open(&endpoint).await.unwrap();
    assert_eq!(handle.kind(), TransportKind::WebSocket);
}
