//! Wardwatch - a neighborhood-watch backend
//!
//! Citizens submit geotagged incident reports (optionally with a photo)
//! and trigger panic alarms; dashboards watch everything live over a
//! WebSocket; offline users are reached via web push.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - REST endpoints (reports, users, alerts)                  │
//! │  - WebSocket live channel                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Notification Core                          │
//! │  - Event orchestration (enrich, broadcast, dispatch)        │
//! │  - Reverse geocoding (Nominatim)                            │
//! │  - Push fan-out with expired-endpoint cleanup               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Local photo storage                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `realtime`: WebSocket protocol, broadcaster, socket handling
//! - `notify`: geocoding, push delivery, event orchestration
//! - `data`: database layer and models
//! - `storage`: uploaded photo storage
//! - `config`: configuration management
//! - `error`: error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod realtime;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool, the connection
/// registry and the notification core.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Uploaded photo storage
    pub photos: Arc<storage::PhotoStorage>,

    /// Live-client connection registry
    pub broadcaster: Arc<realtime::RealtimeBroadcaster>,

    /// Notification core entry point
    pub orchestrator: Arc<notify::EventOrchestrator>,

    /// Shared HTTP client (geocoding, push delivery)
    pub http_client: Arc<reqwest::Client>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Open photo storage
    /// 3. Build the shared HTTP client
    /// 4. Wire the notification core
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let photos = Arc::new(
            storage::PhotoStorage::new(&config.uploads.dir, config.uploads.max_photo_bytes)
                .await?,
        );
        tracing::info!(dir = %config.uploads.dir.display(), "Photo storage initialized");

        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent("wardwatch/0.1.0")
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );

        let broadcaster = Arc::new(realtime::RealtimeBroadcaster::new());

        let geocoder = Arc::new(notify::NominatimGeocoder::new(
            http_client.clone(),
            &config.geocoder.base_url,
            config.geocoder.timeout(),
        )?);

        let push_client = Arc::new(notify::HttpPushClient::new(
            http_client.clone(),
            config.push.timeout(),
        ));
        let dispatcher = Arc::new(notify::NotificationDispatcher::new(
            push_client,
            db.clone(),
            config.push.max_concurrent,
        ));

        let orchestrator = Arc::new(notify::EventOrchestrator::new(
            geocoder,
            broadcaster.clone(),
            dispatcher,
            db.clone(),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            photos,
            broadcaster,
            orchestrator,
            http_client,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use axum::extract::DefaultBodyLimit;
    use tower_http::{
        compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
    };

    // Photo (5 MiB) plus the rest of the form, with headroom.
    let body_limit = state.config.uploads.max_photo_bytes * 2;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/ws", axum::routing::get(realtime::ws_handler))
        .nest("/api/reports", api::reports_router())
        .nest("/api/users", api::users_router())
        .nest("/api/alerts", api::alerts_router())
        .nest_service("/uploads", ServeDir::new(state.photos.root()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
