//! WebSocket upgrade handler: the ingress side of the hub.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::StreamExt;
use tokio::sync::oneshot;

use crate::error::ApiError;
use crate::AppState;

use super::connection::Connection;
use super::pump;

/// The only upgrade path the server exposes.
pub const WS_PATH: &str = "/ws";

pub fn router() -> Router<AppState> {
    Router::new().route(WS_PATH, any(ws_upgrade))
}

/// Any origin may connect. A request that is not a valid upgrade, whatever its
/// method, gets a 404.
async fn ws_upgrade(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_connection(socket, state))
            .into_response(),
        Err(rejection) => {
            tracing::debug!(%rejection, "websocket upgrade rejected");
            ApiError::not_found("Not found").into_response()
        }
    }
}

/// Register the new connection, then hand the socket halves to its pumps.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (connection, queue) = Connection::open(state.config.outbound_queue_capacity);
    let id = connection.id().clone();

    if let Err(err) = state.hub.register(connection).await {
        tracing::error!(%err, connection_id = %id, "could not register connection");
        return;
    }

    let (ws_tx, ws_rx) = socket.split();
    let (writer_done_tx, writer_done_rx) = oneshot::channel();
    tokio::spawn(pump::outbound(id.clone(), queue, ws_tx, writer_done_tx));
    tokio::spawn(pump::inbound(id, state.hub.clone(), ws_rx, writer_done_rx));
}
