mod channel;
mod event_types;
mod hooks;

pub use channel::{EventProducer, Handler, HookQueue};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
