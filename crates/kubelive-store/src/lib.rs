//! kubelive-store: in-memory bounded event history with a latest-state
//! index per resource, shared by every consumer in the process.

pub mod shared;
pub mod store;

pub use shared::SharedEventStore;
pub use store::{DEFAULT_MAX_HISTORY, EventFilter, EventStats, EventStore, ResourceEvents};
