//! Inventory reservation ledger.
//!
//! The ledger is the one shared resource manager in the system: it holds
//! per-product stock levels and a log of reservations keyed by an
//! idempotency key. `reserve` is atomic across the whole batch
//! (all-or-nothing), idempotent under replay, and reversible via
//! `release`. Every mutation is written to stable storage before the
//! call returns, so a crash can neither lose a reservation nor
//! double-spend stock on recovery.

pub mod error;
pub mod ledger;
pub mod postgres;
pub mod store;

pub use error::{LedgerError, Result};
pub use ledger::{ReserveOutcome, ReservationLedger};
pub use postgres::PostgresLedgerStore;
pub use store::{
    InMemoryLedgerStore, LedgerSnapshot, LedgerStore, Reservation, ReservationLine,
    ReservationStatus,
};
