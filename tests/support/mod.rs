// Shared helpers for starting a relay server and driving it with WebSocket clients.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use presence_server::RelaySettings;
use serde_json::Value;
use std::{net::SocketAddr, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Upper bound for any single expected frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

// Start a fresh server per test so player counts never leak between tests.
pub async fn start_server(heartbeat_interval: Duration) -> SocketAddr {
    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");

    let settings = RelaySettings {
        event_channel_capacity: 64,
        outbound_channel_capacity: 64,
        heartbeat_interval,
    };
    // The server lives on the test runtime and stops with it.
    tokio::spawn(async move {
        presence_server::run_with_settings(listener, settings)
            .await
            .expect("server failed");
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("websocket handshake");
    client
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .expect("send frame");
}

// Next text frame as JSON, or None once the server closed the connection.
// Reading keeps the client answering server pings.
pub async fn next_text(client: &mut Client) -> Option<Value> {
    while let Some(message) = client.next().await {
        match message {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(text.as_str()).expect("server sends json"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

pub async fn next_json(client: &mut Client) -> Value {
    tokio::time::timeout(RECV_TIMEOUT, next_text(client))
        .await
        .expect("timed out waiting for frame")
        .expect("connection closed while waiting for frame")
}

// Fail if any text frame arrives within `window`.
pub async fn assert_silent(client: &mut Client, window: Duration) {
    if let Ok(Some(frame)) = tokio::time::timeout(window, next_text(client)).await {
        panic!("expected no frames, got {frame}");
    }
}

// Connect and join; returns the client and its `joined` reply.
pub async fn join(addr: SocketAddr, name: &str) -> (Client, Value) {
    let mut client = connect(addr).await;
    send_json(&mut client, serde_json::json!({"type": "join", "player": name})).await;
    let joined = next_json(&mut client).await;
    assert_eq!(joined["type"], "joined");
    (client, joined)
}
