//! The hub: sole owner of connection membership and broadcast delivery.
//!
//! Runs as a single task consuming [`HubRequest`]s from a bounded channel, so
//! register, unregister and broadcast never interleave. Pumps talk to it
//! through a cloneable [`HubHandle`].
//!
//! Delivery never waits on a member. A payload that does not fit in a
//! member's outbound queue gets that member evicted on the spot, which closes
//! its queue and lets its outbound pump shut the socket. A member whose
//! writer has already stopped is left in place until its inbound pump
//! unregisters it, so the remaining members still hear that it left.

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};

use super::connection::{Connection, ConnectionId, Enqueue};
use super::events::{Envelope, NOTICE_CONNECTED, NOTICE_DISCONNECTED};

/// A request submitted to the hub task.
#[derive(Debug)]
pub enum HubRequest {
    Register(Connection),
    Unregister(ConnectionId),
    Broadcast(Envelope),
    /// Snapshot of current member ids.
    Members(oneshot::Sender<Vec<ConnectionId>>),
}

/// The hub task has stopped and accepts no more requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    Closed,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Closed => f.write_str("hub is no longer running"),
        }
    }
}

impl std::error::Error for HubError {}

impl<T> From<mpsc::error::SendError<T>> for HubError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        HubError::Closed
    }
}

/// Submission side of the hub. Cloneable; store in `AppState`.
#[derive(Clone)]
pub struct HubHandle {
    requests: mpsc::Sender<HubRequest>,
}

impl HubHandle {
    /// Create a hub and run it on the current tokio runtime.
    pub fn spawn(capacity: usize) -> Self {
        let (hub, handle) = Hub::new(capacity);
        tokio::spawn(hub.run());
        handle
    }

    pub async fn register(&self, connection: Connection) -> Result<(), HubError> {
        self.requests.send(HubRequest::Register(connection)).await?;
        Ok(())
    }

    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.requests.send(HubRequest::Unregister(id)).await?;
        Ok(())
    }

    pub async fn broadcast(&self, envelope: Envelope) -> Result<(), HubError> {
        self.requests.send(HubRequest::Broadcast(envelope)).await?;
        Ok(())
    }

    /// Ids of the current members, sorted.
    pub async fn members(&self) -> Result<Vec<ConnectionId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(HubRequest::Members(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Connection membership plus the receiving end of the request channel.
pub struct Hub {
    members: HashMap<ConnectionId, Connection>,
    requests: mpsc::Receiver<HubRequest>,
}

impl Hub {
    /// Create a hub whose request channel holds up to `capacity` requests.
    pub fn new(capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let hub = Self {
            members: HashMap::new(),
            requests: rx,
        };
        (hub, HubHandle { requests: tx })
    }

    /// Process requests in arrival order until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("hub started");
        while let Some(request) = self.requests.recv().await {
            self.handle(request);
        }
        tracing::info!(members = self.members.len(), "hub stopped");
    }

    fn handle(&mut self, request: HubRequest) {
        match request {
            HubRequest::Register(connection) => {
                self.register(connection);
            }
            HubRequest::Unregister(id) => {
                self.unregister(&id);
            }
            HubRequest::Broadcast(envelope) => {
                self.broadcast(&envelope);
            }
            HubRequest::Members(reply) => {
                // Requester may have given up waiting.
                let _ = reply.send(self.members());
            }
        }
    }

    /// Add a connection and tell everyone else about it. Returns `false` if a
    /// connection with the same id is already a member.
    pub fn register(&mut self, connection: Connection) -> bool {
        let id = connection.id().clone();
        if self.members.contains_key(&id) {
            tracing::warn!(connection_id = %id, "connection already registered");
            return false;
        }

        self.members.insert(id.clone(), connection);
        tracing::info!(connection_id = %id, members = self.members.len(), "connection registered");

        self.fan_out(&Envelope::notice(NOTICE_CONNECTED), Some(&id));
        true
    }

    /// Remove a connection, closing its outbound queue, and tell the remaining
    /// members. Returns `false` if it was not a member.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        let Some(connection) = self.members.remove(id) else {
            return false;
        };
        drop(connection);
        tracing::info!(connection_id = %id, members = self.members.len(), "connection unregistered");

        self.fan_out(&Envelope::notice(NOTICE_DISCONNECTED), Some(id));
        true
    }

    /// Deliver a client message to every member, its sender included. Returns
    /// the number of members the payload was queued for.
    pub fn broadcast(&mut self, envelope: &Envelope) -> usize {
        self.fan_out(envelope, None)
    }

    /// Ids of the current members, sorted.
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.members.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    fn fan_out(&mut self, envelope: &Envelope, except: Option<&ConnectionId>) -> usize {
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(?err, "failed to encode envelope, dropping it");
                return 0;
            }
        };
        self.deliver(payload, except)
    }

    fn deliver(&mut self, payload: Utf8Bytes, except: Option<&ConnectionId>) -> usize {
        let mut queued = 0;
        self.members.retain(|id, connection| {
            if except == Some(id) {
                return true;
            }
            match connection.try_enqueue(payload.clone()) {
                Enqueue::Queued => {
                    queued += 1;
                    true
                }
                Enqueue::Full => {
                    tracing::warn!(connection_id = %id, "outbound queue full, dropping connection");
                    false
                }
                // Writer already gone; its inbound pump will unregister it.
                Enqueue::Closed => {
                    tracing::debug!(connection_id = %id, "outbound pump gone, skipping delivery");
                    true
                }
            }
        });
        queued
    }
}
