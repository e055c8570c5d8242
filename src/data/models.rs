//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Geography
// =============================================================================

/// A geographic point as submitted by a client.
///
/// Latitude first, longitude second. The pair is carried through the
/// system exactly as produced by the submitter; it is never reordered
/// or normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both coordinates are real numbers (not NaN/infinite)
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// The (0, 0) pair used by clients that have no GPS fix
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

// =============================================================================
// User
// =============================================================================

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserRole {
    Citizen,
    Police,
    Admin,
}

/// A registered user: report submitter, dashboard viewer, push target
///
/// Credentials and session state are owned by an external collaborator;
/// the core only reads ids, last-known locations and push subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    /// Last known location, if the user has shared one
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Report
// =============================================================================

/// Incident category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportType {
    RoadDamage,
    StreetLight,
    Suspicious,
    Other,
}

/// Report lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

/// A citizen-submitted incident report
///
/// Coordinates are nullable: a report submitted without a usable
/// location is still stored and still broadcast (with the sentinel
/// address substituted downstream).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub description: String,
    /// URL path of the uploaded photo, if any
    pub photo_url: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: ReportStatus,
    /// Submitter, if known (authentication is handled elsewhere)
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// The submitted coordinate pair, if both halves are present
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

// =============================================================================
// Alert
// =============================================================================

/// Panic alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
    FalseAlarm,
}

/// A persisted panic alert
///
/// Written by the ingestion layer when a panic event arrives over the
/// live channel; the broadcast itself never depends on this row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub lat: f64,
    pub lng: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Push subscriptions
// =============================================================================

/// A durable web-push delivery target
///
/// The endpoint URL is the de-duplication key: a user never holds two
/// subscriptions with the same endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
    /// Opaque encryption keys blob as supplied by the browser
    /// (serialized JSON, typically `{"p256dh": ..., "auth": ...}`)
    pub keys: String,
    pub created_at: DateTime<Utc>,
}

/// Client opt-in payload for a new push subscription
#[derive(Debug, Clone, Deserialize)]
pub struct NewPushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub keys: serde_json::Value,
}
