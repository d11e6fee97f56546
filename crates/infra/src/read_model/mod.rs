//! Planned-event-isolated read model storage.

pub mod event_scoped_store;

pub use event_scoped_store::{EventScopedStore, InMemoryEventScopedStore};
