//! WebSocket endpoint
//!
//! Each accepted socket gets an unbounded forwarding channel registered
//! with the broadcaster, so broadcast fan-out never blocks on a slow
//! client. Inbound frames are parsed into the typed protocol; anything
//! unparseable is logged and dropped without closing the connection.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::broadcaster::ClientId;
use super::events::InboundEvent;
use crate::AppState;
use crate::data::{Alert, AlertStatus, EntityId};
use crate::metrics::PANIC_ALERTS_TOTAL;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let id = state.broadcaster.on_connect(tx).await;

    // Drain the broadcast channel onto this client's socket.
    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handle_frame(&state, &id, &text).await,
            Message::Close(_) => break,
            // Ping/pong are answered by axum; binary frames are not
            // part of the protocol.
            _ => {}
        }
    }

    state.broadcaster.on_disconnect(&id).await;
    forward.abort();
}

async fn handle_frame(state: &AppState, id: &ClientId, text: &str) {
    let event = match serde_json::from_str::<InboundEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(client_id = %id, error = %e, "Ignoring malformed frame");
            return;
        }
    };

    match event {
        InboundEvent::Panic(panic) => {
            PANIC_ALERTS_TOTAL.inc();

            // Persist for the alert history; the live broadcast does
            // not wait for or depend on this row.
            let alert = Alert {
                id: EntityId::new().0,
                user_id: panic.user_id.clone(),
                lat: panic.lat,
                lng: panic.lng,
                status: AlertStatus::Active,
                created_at: chrono::Utc::now(),
                resolved_at: None,
            };
            if let Err(e) = state.db.insert_alert(&alert).await {
                tracing::error!(user_id = %panic.user_id, error = %e, "Failed to persist panic alert");
            }

            state.orchestrator.on_panic(panic).await;
        }
        InboundEvent::LocationUpdate(update) => {
            state.orchestrator.on_location_update(update, id).await;
        }
    }
}
