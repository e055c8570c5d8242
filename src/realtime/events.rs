//! Live-channel wire protocol
//!
//! Every frame on the WebSocket is a JSON object tagged by `event`,
//! with the event-specific fields under `data`. Payloads are explicit
//! structs per event kind; nothing untyped crosses this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{GeoPoint, Report, ReportStatus, ReportType};

/// Events the server pushes to connected dashboard clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    /// A newly created report, enriched with a resolved address
    #[serde(rename = "newReport")]
    NewReport(ReportPayload),
    /// A panic alarm; delivered to every client including the originator
    #[serde(rename = "panicAlert")]
    PanicAlert(PanicPayload),
    /// A peer's location update, relayed to everyone but the sender
    #[serde(rename = "userLocation")]
    UserLocation(LocationUpdate),
}

impl OutboundEvent {
    /// Wire event name, used for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewReport(_) => "newReport",
            Self::PanicAlert(_) => "panicAlert",
            Self::UserLocation(_) => "userLocation",
        }
    }
}

/// Events clients send to the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    #[serde(rename = "locationUpdate")]
    LocationUpdate(LocationUpdate),
    #[serde(rename = "panic")]
    Panic(PanicEvent),
}

/// Enriched report as broadcast to dashboards
///
/// Coordinates default to (0, 0) when the report carried none, matching
/// what the submitter's client sent (or failed to send); the address is
/// the geocoder's best effort or the sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub description: String,
    pub photo_url: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl ReportPayload {
    pub fn from_report(report: &Report, point: GeoPoint, address: String) -> Self {
        Self {
            id: report.id.clone(),
            report_type: report.report_type,
            description: report.description.clone(),
            photo_url: report.photo_url.clone(),
            lat: point.lat,
            lng: point.lng,
            address,
            status: report.status,
            created_at: report.created_at,
        }
    }
}

/// Panic alarm as broadcast to dashboards
///
/// Zero coordinates are passed through as-is; a panic without a GPS fix
/// still reaches every client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanicPayload {
    pub user_id: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// Inbound panic alarm
///
/// Coordinates default to (0, 0) when the client has no GPS fix and
/// omits them entirely; the alarm must still go through.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanicEvent {
    pub user_id: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

impl PanicEvent {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Live location of a user, relayed between dashboard clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub user_id: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_panic_frame_parses() {
        let frame = r#"{"event":"panic","data":{"userId":"u1","lat":-6.2,"lng":106.8166}}"#;
        let event: InboundEvent = serde_json::from_str(frame).unwrap();
        assert_eq!(
            event,
            InboundEvent::Panic(PanicEvent {
                user_id: "u1".to_string(),
                lat: -6.2,
                lng: 106.8166,
            })
        );
    }

    #[test]
    fn panic_frame_without_coordinates_parses_as_zero() {
        let frame = r#"{"event":"panic","data":{"userId":"u1"}}"#;
        let event: InboundEvent = serde_json::from_str(frame).unwrap();
        assert_eq!(
            event,
            InboundEvent::Panic(PanicEvent {
                user_id: "u1".to_string(),
                lat: 0.0,
                lng: 0.0,
            })
        );
    }

    #[test]
    fn inbound_location_update_frame_parses() {
        let frame = r#"{"event":"locationUpdate","data":{"userId":"u1","lat":1.5,"lng":2.5}}"#;
        let event: InboundEvent = serde_json::from_str(frame).unwrap();
        assert!(matches!(event, InboundEvent::LocationUpdate(_)));
    }

    #[test]
    fn unknown_inbound_event_is_an_error() {
        let frame = r#"{"event":"selfDestruct","data":{}}"#;
        assert!(serde_json::from_str::<InboundEvent>(frame).is_err());
    }

    #[test]
    fn panic_alert_serializes_with_wire_names() {
        let event = OutboundEvent::PanicAlert(PanicPayload {
            user_id: "u1".to_string(),
            lat: 0.0,
            lng: 0.0,
            address: "Unknown location".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "panicAlert");
        assert_eq!(json["data"]["userId"], "u1");
        assert_eq!(json["data"]["address"], "Unknown location");
    }

    #[test]
    fn event_names_match_wire_tags() {
        let update = OutboundEvent::UserLocation(LocationUpdate {
            user_id: "u1".to_string(),
            lat: 1.0,
            lng: 2.0,
        });
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["event"], update.name());
    }
}
