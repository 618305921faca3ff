//! Engine event bus and event types

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::{EngineEvent, UnmetDependency};
