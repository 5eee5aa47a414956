//! Ledger persistence: snapshot types and the store trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// One product line inside a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    /// The reserved product.
    pub product_id: ProductId,
    /// Units reserved.
    pub quantity: u32,
}

/// Lifecycle of a reservation. Reservations are never deleted; a
/// released one stays in the log as the historical record that makes
/// replay idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Stock is debited and held.
    Active,
    /// Stock was credited back.
    Released,
}

/// A recorded reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// The caller-supplied idempotency key.
    pub reservation_id: AggregateId,
    /// The reserved lines.
    pub lines: Vec<ReservationLine>,
    /// Current status.
    pub status: ReservationStatus,
}

/// The full persisted state of the ledger: stock table + reservation log.
///
/// Persisted as a unit so the two structures can never diverge on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Available quantity per product.
    pub stocks: HashMap<ProductId, u32>,
    /// All reservations ever recorded, keyed by reservation id.
    pub reservations: HashMap<AggregateId, Reservation>,
}

/// Durable backing store for the ledger.
///
/// `persist` must complete before the ledger acknowledges a mutation
/// (write-then-acknowledge), and `load` must return content identical to
/// what was last persisted, across process restarts.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Writes the full ledger state to stable storage.
    async fn persist(&self, snapshot: &LedgerSnapshot) -> Result<()>;

    /// Loads the last persisted ledger state.
    ///
    /// Returns None if nothing was ever persisted.
    async fn load(&self) -> Result<Option<LedgerSnapshot>>;
}

#[derive(Debug, Default)]
struct InMemoryLedgerStoreState {
    snapshot: Option<LedgerSnapshot>,
    fail_on_persist: bool,
    persist_count: u64,
}

/// In-memory ledger store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<InMemoryLedgerStoreState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on subsequent persist calls.
    pub fn set_fail_on_persist(&self, fail: bool) {
        self.state.write().unwrap().fail_on_persist = fail;
    }

    /// Returns how many times persist succeeded.
    pub fn persist_count(&self) -> u64 {
        self.state.read().unwrap().persist_count
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn persist(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_persist {
            return Err(LedgerError::Store("persist failed".to_string()));
        }
        state.snapshot = Some(snapshot.clone());
        state.persist_count += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        Ok(self.state.read().unwrap().snapshot.clone())
    }
}
