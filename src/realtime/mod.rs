//! Live dashboard channel: wire protocol, broadcaster, socket handling

mod broadcaster;
mod events;
mod socket;

pub use broadcaster::{Broadcast, ClientId, RealtimeBroadcaster};
pub use events::{
    InboundEvent, LocationUpdate, OutboundEvent, PanicEvent, PanicPayload, ReportPayload,
};
pub use socket::ws_handler;
