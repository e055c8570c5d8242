//! Report endpoints
//!
//! Routes:
//! - POST /api/reports - Submit a report (multipart, optional photo)
//! - GET /api/reports - List reports, newest first
//! - PATCH /api/reports/:id/status - Update report status

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{patch, post},
};
use serde::Deserialize;

use crate::AppState;
use crate::data::{EntityId, Report, ReportStatus, ReportType};
use crate::error::AppError;
use crate::metrics::REPORTS_CREATED_TOTAL;

pub fn reports_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_report).get(list_reports))
        .route("/:id/status", patch(update_status))
}

/// Location form field as sent by the dashboard
///
/// Coordinates are `[lat, lng]`, latitude first.
#[derive(Debug, Deserialize)]
struct LocationField {
    coordinates: [f64; 2],
}

#[derive(Debug, Default)]
struct ReportForm {
    report_type: Option<ReportType>,
    description: Option<String>,
    location: Option<LocationField>,
    user_id: Option<String>,
    photo: Option<(String, Vec<u8>)>,
}

/// POST /api/reports
///
/// Multipart fields: `type`, `description`, `location` (JSON string),
/// optional `userId`, optional `photo` file. A missing or unparseable
/// location is stored as NULL; enrichment downstream substitutes the
/// sentinel address.
async fn create_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let form = read_form(multipart, state.config.uploads.max_photo_bytes).await?;

    let report_type = form
        .report_type
        .ok_or_else(|| AppError::Validation("missing or invalid report type".to_string()))?;
    let description = form
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::Validation("description is required".to_string()))?;

    let photo_url = match form.photo {
        Some((filename, bytes)) => Some(state.photos.store_report_photo(&filename, &bytes).await?),
        None => None,
    };

    let (lat, lng) = match form.location {
        Some(location) => {
            let [lat, lng] = location.coordinates;
            if lat.is_finite() && lng.is_finite() {
                (Some(lat), Some(lng))
            } else {
                (None, None)
            }
        }
        None => (None, None),
    };

    let report = Report {
        id: EntityId::new().0,
        report_type,
        description,
        photo_url,
        lat,
        lng,
        status: ReportStatus::Pending,
        user_id: form.user_id,
        created_at: chrono::Utc::now(),
    };

    state.db.insert_report(&report).await?;
    REPORTS_CREATED_TOTAL.inc();
    tracing::info!(report_id = %report.id, report_type = ?report.report_type, "Report created");

    // The live broadcast is issued before this response completes;
    // only the push fan-out runs detached inside the orchestrator.
    state.orchestrator.on_report_created(report.clone()).await;

    Ok((StatusCode::CREATED, Json(report)))
}

async fn read_form(mut multipart: Multipart, max_photo_bytes: usize) -> Result<ReportForm, AppError> {
    let mut form = ReportForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                form.report_type =
                    serde_json::from_value(serde_json::Value::String(value.clone())).ok();
                if form.report_type.is_none() {
                    tracing::debug!(value = %value, "Unknown report type");
                }
            }
            "description" => {
                form.description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "location" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                form.location = serde_json::from_str(&value).ok();
                if form.location.is_none() {
                    tracing::debug!(value = %value, "Unparseable location field; storing without coordinates");
                }
            }
            "userId" => {
                form.user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
                .filter(|id| !id.is_empty());
            }
            "photo" => {
                let filename = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| AppError::Validation("photo has no filename".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read photo: {}", e)))?;
                if bytes.len() > max_photo_bytes {
                    return Err(AppError::Validation(format!(
                        "photo exceeds maximum size of {} bytes",
                        max_photo_bytes
                    )));
                }
                form.photo = Some((filename, bytes.to_vec()));
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
            }
        }
    }

    Ok(form)
}

/// GET /api/reports
async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<Report>>, AppError> {
    let reports = state.db.list_reports().await?;
    Ok(Json(reports))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: ReportStatus,
}

/// PATCH /api/reports/:id/status
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Report>, AppError> {
    let report = state
        .db
        .update_report_status(&id, req.status)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(report_id = %id, status = ?req.status, "Report status updated");
    Ok(Json(report))
}
