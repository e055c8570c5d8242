//! Live-client broadcaster
//!
//! Owns the set of currently connected WebSocket clients and pushes
//! serialized events to all of them (or all-but-sender). Delivery is
//! at-most-once and fire-and-forget: a client that is not connected at
//! call time simply misses the event, and a dead handle's send failure
//! is isolated to that handle.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::{RwLock, mpsc};

use super::events::OutboundEvent;
use crate::metrics::{BROADCAST_SEND_FAILURES_TOTAL, BROADCASTS_TOTAL, WS_CONNECTIONS};

/// Opaque handle identifying one live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Broadcast capability as seen by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcast: Send + Sync {
    /// Deliver to every client connected at call time
    async fn broadcast_all(&self, event: &OutboundEvent);

    /// Deliver to every client except the originating connection
    async fn broadcast_except(&self, event: &OutboundEvent, sender: &ClientId);
}

/// Production broadcaster backed by an explicit connection registry
///
/// The registry is owned exclusively by this type and mutated only via
/// `on_connect`/`on_disconnect`. Senders are unbounded channels, so a
/// broadcast never awaits while the registry lock is held; a slow
/// client's socket backpressure lands in its own forwarding task.
pub struct RealtimeBroadcaster {
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<Message>>>,
}

impl RealtimeBroadcaster {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly opened connection
    ///
    /// # Returns
    /// The handle the connection must pass back on disconnect
    pub async fn on_connect(&self, sender: mpsc::UnboundedSender<Message>) -> ClientId {
        let id = ClientId::new();

        let mut clients = self.clients.write().await;
        clients.insert(id.clone(), sender);
        WS_CONNECTIONS.set(clients.len() as i64);

        tracing::info!(client_id = %id, connected = clients.len(), "Client connected");
        id
    }

    /// Remove a closed connection
    ///
    /// A reconnecting client gets a brand-new handle; no state survives.
    pub async fn on_disconnect(&self, id: &ClientId) {
        let mut clients = self.clients.write().await;
        clients.remove(id);
        WS_CONNECTIONS.set(clients.len() as i64);

        tracing::info!(client_id = %id, connected = clients.len(), "Client disconnected");
    }

    /// Number of currently connected clients
    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn send_filtered(&self, event: &OutboundEvent, skip: Option<&ClientId>) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "Failed to serialize event");
                return;
            }
        };

        let clients = self.clients.read().await;
        let mut failures = 0usize;

        for (id, sender) in clients.iter() {
            if skip == Some(id) {
                continue;
            }
            // A failed send means the receiver task is gone mid-disconnect;
            // the registry catches up when on_disconnect runs.
            if sender.send(Message::Text(text.clone())).is_err() {
                failures += 1;
                tracing::debug!(client_id = %id, event = event.name(), "Dropped send to dead handle");
            }
        }

        BROADCASTS_TOTAL.with_label_values(&[event.name()]).inc();
        if failures > 0 {
            BROADCAST_SEND_FAILURES_TOTAL.inc_by(failures as u64);
        }

        tracing::debug!(
            event = event.name(),
            targets = clients.len(),
            failures,
            "Broadcast issued"
        );
    }
}

impl Default for RealtimeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcast for RealtimeBroadcaster {
    async fn broadcast_all(&self, event: &OutboundEvent) {
        self.send_filtered(event, None).await;
    }

    async fn broadcast_except(&self, event: &OutboundEvent, sender: &ClientId) {
        self.send_filtered(event, Some(sender)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::{LocationUpdate, PanicPayload};

    fn location_event() -> OutboundEvent {
        OutboundEvent::UserLocation(LocationUpdate {
            user_id: "u1".to_string(),
            lat: 1.0,
            lng: 2.0,
        })
    }

    fn panic_event() -> OutboundEvent {
        OutboundEvent::PanicAlert(PanicPayload {
            user_id: "u1".to_string(),
            lat: 0.0,
            lng: 0.0,
            address: "Unknown location".to_string(),
        })
    }

    fn received_text(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<String> {
        match rx.try_recv() {
            Ok(Message::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_connected_client() {
        let broadcaster = RealtimeBroadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        broadcaster.on_connect(tx_a).await;
        broadcaster.on_connect(tx_b).await;

        broadcaster.broadcast_all(&panic_event()).await;

        assert!(received_text(&mut rx_a).unwrap().contains("panicAlert"));
        assert!(received_text(&mut rx_b).unwrap().contains("panicAlert"));
    }

    #[tokio::test]
    async fn broadcast_except_skips_only_the_sender() {
        let broadcaster = RealtimeBroadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let sender_id = broadcaster.on_connect(tx_a).await;
        broadcaster.on_connect(tx_b).await;

        broadcaster
            .broadcast_except(&location_event(), &sender_id)
            .await;

        assert!(received_text(&mut rx_a).is_none());
        assert!(received_text(&mut rx_b).unwrap().contains("userLocation"));
    }

    #[tokio::test]
    async fn dead_handle_does_not_abort_broadcast_to_others() {
        let broadcaster = RealtimeBroadcaster::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        broadcaster.on_connect(tx_dead).await;
        broadcaster.on_connect(tx_live).await;
        drop(rx_dead);

        broadcaster.broadcast_all(&panic_event()).await;

        assert!(received_text(&mut rx_live).is_some());
    }

    #[tokio::test]
    async fn disconnect_removes_handle_from_registry() {
        let broadcaster = RealtimeBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = broadcaster.on_connect(tx).await;
        assert_eq!(broadcaster.connected_count().await, 1);

        broadcaster.on_disconnect(&id).await;
        assert_eq!(broadcaster.connected_count().await, 0);

        broadcaster.broadcast_all(&panic_event()).await;
        assert!(received_text(&mut rx).is_none());
    }
}
