//! Alert endpoints
//!
//! Routes:
//! - GET /api/alerts - List panic alerts, newest first
//! - PATCH /api/alerts/:id/status - Resolve or dismiss an alert

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, patch},
};
use serde::Deserialize;

use crate::AppState;
use crate::data::{Alert, AlertStatus};
use crate::error::AppError;

pub fn alerts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_alerts))
        .route("/:id/status", patch(update_status))
}

/// GET /api/alerts
async fn list_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, AppError> {
    let alerts = state.db.list_alerts().await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: AlertStatus,
}

/// PATCH /api/alerts/:id/status
///
/// Leaving `active` stamps `resolved_at`; re-activating clears it.
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Alert>, AppError> {
    let alert = state
        .db
        .update_alert_status(&id, req.status)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(alert_id = %id, status = ?req.status, "Alert status updated");
    Ok(Json(alert))
}
