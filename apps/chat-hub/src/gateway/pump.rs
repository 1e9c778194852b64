//! Per-connection pumps between the WebSocket and the hub.
//!
//! Each connection gets two independent tasks. The inbound pump turns frames
//! into broadcast requests; the outbound pump drains the connection's queue
//! onto the socket. They share nothing but the hub and a oneshot the
//! outbound pump drops when it stops, which ends the inbound pump too.

use std::fmt;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;

use super::connection::{ConnectionId, OutboundQueue};
use super::events::Envelope;
use super::hub::HubHandle;

/// Read frames until the client goes away, broadcasting each one.
///
/// Submits exactly one unregister when the stream ends, errors, a close
/// frame arrives, or the outbound pump for the same socket stops.
pub async fn inbound<R, E>(
    id: ConnectionId,
    hub: HubHandle,
    mut stream: R,
    mut writer_done: oneshot::Receiver<()>,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Debug,
{
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = &mut writer_done => {
                tracing::debug!(connection_id = %id, "outbound pump stopped, closing read side");
                break;
            }
        };

        let content = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(?e, connection_id = %id, "ws read error");
                break;
            }
        };

        if hub
            .broadcast(Envelope::message(id.as_str(), content))
            .await
            .is_err()
        {
            tracing::debug!(connection_id = %id, "hub stopped, ending inbound pump");
            return;
        }
    }

    if let Err(err) = hub.unregister(id.clone()).await {
        tracing::debug!(%err, connection_id = %id, "unregister after disconnect failed");
    }
}

/// Write queued payloads to the socket until the hub closes the queue, then
/// send a close frame. A write error ends the pump immediately.
///
/// `_done` is dropped on return, which tells the inbound pump to stop.
pub async fn outbound<S>(
    id: ConnectionId,
    mut queue: OutboundQueue,
    mut sink: S,
    _done: oneshot::Sender<()>,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Debug,
{
    while let Some(payload) = queue.next().await {
        if let Err(e) = sink.send(Message::Text(payload)).await {
            tracing::debug!(?e, connection_id = %id, "ws write error");
            return;
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static(""),
    }));
    if let Err(e) = sink.send(close).await {
        tracing::debug!(?e, connection_id = %id, "failed to send close frame");
    }
}
