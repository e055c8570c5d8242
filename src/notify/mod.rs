//! Notification core: geocoding, push delivery, event orchestration

mod geocode;
mod orchestrator;
mod push;
mod registry;

pub use geocode::{Geocoder, NominatimGeocoder, UNKNOWN_LOCATION};
pub use orchestrator::EventOrchestrator;
pub use push::{
    DeliveryError, Dispatch, DispatchSummary, HttpPushClient, NotificationDispatcher, PushClient,
    PushData, PushPayload,
};
pub use registry::{SubscriptionRegistry, UserDirectory};
