//! User endpoints
//!
//! Routes:
//! - POST /api/users - Register a user
//! - POST /api/users/subscribe - Register a push subscription

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
};
use serde::Deserialize;

use crate::AppState;
use crate::data::{EntityId, NewPushSubscription, User, UserRole};
use crate::error::AppError;

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/subscribe", post(subscribe))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    name: String,
    email: String,
    phone: Option<String>,
    role: Option<UserRole>,
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }

    let now = chrono::Utc::now();
    let user = User {
        id: EntityId::new().0,
        name: req.name,
        email: req.email,
        phone: req.phone,
        role: req.role.unwrap_or(UserRole::Citizen),
        lat: None,
        lng: None,
        created_at: now,
        updated_at: now,
    };

    state.db.insert_user(&user).await.map_err(|e| match e {
        // UNIQUE(email) violation surfaces as a database error; report
        // it as a client problem instead of a 500.
        AppError::Database(sqlx::Error::Database(db_err))
            if db_err.message().contains("UNIQUE") =>
        {
            AppError::Unprocessable("email is already registered".to_string())
        }
        other => other,
    })?;

    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    user_id: String,
    subscription: NewPushSubscription,
}

/// POST /api/users/subscribe
///
/// Registering the same endpoint twice is a no-op; both calls succeed.
async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.subscription.endpoint.trim().is_empty() {
        return Err(AppError::Validation(
            "subscription endpoint is required".to_string(),
        ));
    }

    state
        .db
        .get_user(&req.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    state.db.add_subscription(&req.user_id, &req.subscription).await?;

    tracing::info!(user_id = %req.user_id, "Push subscription registered");
    Ok(Json(serde_json::json!({
        "message": "Subscription added successfully"
    })))
}
