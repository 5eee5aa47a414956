//! Durable event log for the checkout core.
//!
//! Every long-lived state machine in the system (cart sessions, checkout
//! pipeline records) persists its history here and is rebuilt by replay.
//! Snapshots provide a checkpoint so replay does not start from the
//! beginning of time.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt};
