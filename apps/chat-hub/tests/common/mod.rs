use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chat_hub::config::Config;
use chat_hub::gateway::connection::ConnectionId;
use chat_hub::gateway::events::Envelope;
use chat_hub::AppState;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on how long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn test_config() -> Config {
    Config {
        port: 0,
        outbound_queue_capacity: 64,
        hub_queue_capacity: 64,
    }
}

/// Build the full application router wired to a fresh hub.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::new(test_config());
    let app = chat_hub::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn connect(addr: SocketAddr) -> Client {
    let url = format!("ws://{addr}/ws");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Poll the hub until it reports exactly `count` members.
pub async fn wait_for_members(state: &AppState, count: usize) -> Vec<ConnectionId> {
    time::timeout(WAIT, async {
        loop {
            let members = state.hub.members().await.expect("hub running");
            if members.len() == count {
                return members;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub never reached {count} members"))
}

/// Connect a client and wait until the hub has registered it. Returns the
/// client with its connection id.
pub async fn join(addr: SocketAddr, state: &AppState) -> (Client, ConnectionId) {
    let before = state.hub.members().await.expect("hub running");
    let client = connect(addr).await;
    let after = wait_for_members(state, before.len() + 1).await;
    let id = after
        .into_iter()
        .find(|id| !before.contains(id))
        .expect("new member id");
    (client, id)
}

/// Read the next envelope, skipping control frames.
pub async fn recv_envelope(client: &mut Client) -> Envelope {
    loop {
        let msg = time::timeout(WAIT, client.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            Message::Text(text) => {
                return Envelope::decode(text.as_str()).expect("parse envelope");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Assert that nothing arrives within `window`.
pub async fn assert_silent(client: &mut Client, window: Duration) {
    if let Ok(frame) = time::timeout(window, client.next()).await {
        panic!("Expected no frame, got: {frame:?}");
    }
}
