//! Append-only event store boundary.
//!
//! The in-memory store serves tests and dev; the Postgres store is used when
//! persistent stores are enabled.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
