//! Event orchestration
//!
//! Composition root of the notification core. Takes a freshly stored
//! report or an inbound panic event, enriches it with a best-effort
//! address, broadcasts to connected dashboards first, then hands the
//! push fan-out to a detached background task. No failure in here ever
//! surfaces to the HTTP request or WebSocket frame that triggered it.

use std::sync::Arc;

use super::geocode::{Geocoder, UNKNOWN_LOCATION};
use super::push::{Dispatch, PushData, PushPayload};
use super::registry::UserDirectory;
use crate::data::{GeoPoint, Report};
use crate::realtime::{
    Broadcast, ClientId, LocationUpdate, OutboundEvent, PanicEvent, PanicPayload, ReportPayload,
};

/// Maximum characters of the report description carried in a push body
const PUSH_BODY_EXCERPT_CHARS: usize = 50;

pub struct EventOrchestrator {
    geocoder: Arc<dyn Geocoder>,
    broadcaster: Arc<dyn Broadcast>,
    dispatcher: Arc<dyn Dispatch>,
    users: Arc<dyn UserDirectory>,
}

impl EventOrchestrator {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        broadcaster: Arc<dyn Broadcast>,
        dispatcher: Arc<dyn Dispatch>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            geocoder,
            broadcaster,
            dispatcher,
            users,
        }
    }

    /// Handle a newly persisted report
    ///
    /// The live broadcast is issued before any push work begins; the
    /// fan-out itself runs detached and is never awaited here.
    pub async fn on_report_created(&self, report: Report) {
        let (point, address) = match report.location() {
            Some(point) if point.is_finite() => (point, self.geocoder.resolve(point).await),
            Some(point) => {
                tracing::warn!(report_id = %report.id, lat = point.lat, lng = point.lng,
                    "Report has malformed coordinates; skipping enrichment");
                (GeoPoint::new(0.0, 0.0), UNKNOWN_LOCATION.to_string())
            }
            None => (GeoPoint::new(0.0, 0.0), UNKNOWN_LOCATION.to_string()),
        };

        let payload = ReportPayload::from_report(&report, point, address.clone());
        self.broadcaster
            .broadcast_all(&OutboundEvent::NewReport(payload))
            .await;

        // Current targeting policy: every known user. Narrowing this
        // (e.g. by proximity) is a product decision, not a code one.
        let targets = match self.users.list_all_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(report_id = %report.id, error = %e,
                    "Failed to load push targets; skipping fan-out");
                return;
            }
        };

        let push = report_push_payload(&report, point, &address);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.dispatch(targets, push).await;
        });
    }

    /// Handle a panic alarm from the live channel
    ///
    /// A panic without a GPS fix keeps its zero coordinates and the
    /// sentinel address; it is never dropped. The broadcast goes to
    /// every client, including the originator.
    pub async fn on_panic(&self, event: PanicEvent) {
        tracing::info!(user_id = %event.user_id, lat = event.lat, lng = event.lng,
            "Panic alert received");

        let point = event.point();
        let address = if point.is_zero() || !point.is_finite() {
            UNKNOWN_LOCATION.to_string()
        } else {
            self.geocoder.resolve(point).await
        };

        self.broadcaster
            .broadcast_all(&OutboundEvent::PanicAlert(PanicPayload {
                user_id: event.user_id.clone(),
                lat: event.lat,
                lng: event.lng,
                address: address.clone(),
            }))
            .await;

        let targets = self.panic_push_targets(&event).await;
        if targets.is_empty() {
            return;
        }

        let push = panic_push_payload(&event, &address);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.dispatch(targets, push).await;
        });
    }

    /// Push targets for a panic alarm
    ///
    /// Empty for now. The fan-out path above is already wired, so
    /// filling this in is a targeting change only.
    // TODO: select users near the alert location once user positions
    // are queryable by distance.
    async fn panic_push_targets(&self, _event: &PanicEvent) -> Vec<crate::data::User> {
        Vec::new()
    }

    /// Relay a peer's location to every other connected client
    pub async fn on_location_update(&self, update: LocationUpdate, sender: &ClientId) {
        self.broadcaster
            .broadcast_except(&OutboundEvent::UserLocation(update), sender)
            .await;
    }
}

fn excerpt(description: &str) -> String {
    let truncated: String = description.chars().take(PUSH_BODY_EXCERPT_CHARS).collect();
    if truncated.len() < description.len() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

fn report_push_payload(report: &Report, point: GeoPoint, address: &str) -> PushPayload {
    PushPayload {
        title: "New report".to_string(),
        body: format!(
            "New report: {} at ({:.4}, {:.4}) - {}",
            excerpt(&report.description),
            point.lat,
            point.lng,
            address
        ),
        url: "/dashboard".to_string(),
        data: PushData {
            subject_id: report.id.clone(),
            lat: point.lat,
            lng: point.lng,
            address: address.to_string(),
        },
    }
}

fn panic_push_payload(event: &PanicEvent, address: &str) -> PushPayload {
    PushPayload {
        title: "Panic alert".to_string(),
        body: format!(
            "Panic alert near ({:.4}, {:.4}) - {}",
            event.lat, event.lng, address
        ),
        url: "/dashboard".to_string(),
        data: PushData {
            subject_id: event.user_id.clone(),
            lat: event.lat,
            lng: event.lng,
            address: address.to_string(),
        },
    }
}
