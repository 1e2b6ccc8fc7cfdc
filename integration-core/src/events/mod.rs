//! Topic-based publish/subscribe event bus.

pub mod bus;

pub use bus::{EventBus, EventPublisher, EventRecord, SubscriptionId};
