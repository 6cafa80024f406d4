//! Inbound messaging: frame routing into the store and event fan-out.

pub mod event_bus;
pub mod router;

pub use event_bus::{EventBus, EventKind, RealtimeEvent, SubscriptionId};
pub use router::MessageRouter;
