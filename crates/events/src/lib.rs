//! Event contracts and pub/sub mechanics.
//!
//! Stock services publish facts (stock changed, low stock, batch expired) after
//! their unit of work commits. This crate only provides the mechanics; the
//! inventory crate owns the event types.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
