mod channel;
mod engine_events;
mod event_types;
mod hooks;
mod status_publisher;

pub use channel::{EventHandler, EventProducer, Handler};
pub use engine_events::EngineEvents;
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
pub use status_publisher::{StatusPublisher, StatusSnapshot};
