//! API layer
//!
//! HTTP handlers for:
//! - Reports (submission, listing, status)
//! - Users (registration, push subscriptions)
//! - Alerts (listing, status)
//! - Metrics (Prometheus)

mod alerts;
pub mod metrics;
mod reports;
mod users;

pub use alerts::alerts_router;
pub use metrics::metrics_router;
pub use reports::reports_router;
pub use users::users_router;
