//! Per-connection identity and outbound queue.

use std::fmt;

use axum::extract::ws::Utf8Bytes;
use chat_common::id::{prefix, PrefixedId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Opaque, immutable identity of one client connection (`conn_` prefixed ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl PrefixedId for ConnectionId {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionId {
    pub fn new() -> Self {
        Self(Self::generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a non-blocking enqueue onto a connection's outbound queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// The receiver is not draining fast enough.
    Full,
    /// The outbound pump has already gone away.
    Closed,
}

/// The hub-side half of a connection: identity plus the only sender of its
/// outbound queue. Dropping it closes the queue.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Utf8Bytes>,
}

/// The pump-side half of a connection's outbound queue.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Utf8Bytes>,
}

impl Connection {
    /// Create a connection with a fresh identity and an empty queue that holds
    /// at most `capacity` pending payloads.
    pub fn open(capacity: usize) -> (Self, OutboundQueue) {
        Self::with_id(ConnectionId::new(), capacity)
    }

    pub(crate) fn with_id(id: ConnectionId, capacity: usize) -> (Self, OutboundQueue) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        (Self { id, outbound }, OutboundQueue { rx })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Enqueue a payload without waiting for room.
    pub fn try_enqueue(&self, payload: Utf8Bytes) -> Enqueue {
        match self.outbound.try_send(payload) {
            Ok(()) => Enqueue::Queued,
            Err(TrySendError::Full(_)) => Enqueue::Full,
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }
}

impl OutboundQueue {
    /// Wait for the next payload. `None` once the hub has closed the queue and
    /// everything already queued has been drained.
    pub async fn next(&mut self) -> Option<Utf8Bytes> {
        self.rx.recv().await
    }

    /// Take a payload if one is ready.
    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<Utf8Bytes> {
        self.rx.try_recv().ok()
    }

    /// Whether the hub has dropped its side and nothing is left to drain.
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}
