//! The reservation ledger itself.

use std::collections::HashMap;

use common::AggregateId;
use domain::ProductId;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::{
    LedgerSnapshot, LedgerStore, Reservation, ReservationLine, ReservationStatus,
};

/// Outcome of a reserve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Every line was debited and the reservation recorded.
    Reserved,

    /// At least one product lacked stock; nothing was debited.
    InsufficientStock {
        /// The first product that fell short.
        product_id: ProductId,
        /// How many units were actually available.
        available: u32,
    },
}

impl ReserveOutcome {
    /// Returns true if the batch was reserved.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved)
    }
}

/// The inventory reservation ledger.
///
/// All reserve/release calls serialize through one mutex over the whole
/// ledger state — this is the single shared critical section of the
/// system. Correctness (no oversell) takes priority over throughput at
/// this scale, so the ledger is one logical instance, not sharded.
///
/// A recorded reservation id is never re-evaluated: replaying `reserve`
/// with a known id returns the recorded outcome without touching stock,
/// and replaying `release` on an unknown or already-released id is a
/// success. Both operations persist the stock table and reservation log
/// through the [`LedgerStore`] before returning.
pub struct ReservationLedger<S: LedgerStore> {
    store: S,
    state: Mutex<LedgerSnapshot>,
}

impl<S: LedgerStore> ReservationLedger<S> {
    /// Creates an empty ledger over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(LedgerSnapshot::default()),
        }
    }

    /// Rebuilds a ledger from whatever the store last persisted.
    ///
    /// Post-restart content is identical to pre-restart content.
    pub async fn recover(store: S) -> Result<Self> {
        let snapshot = store.load().await?.unwrap_or_default();
        Ok(Self {
            store,
            state: Mutex::new(snapshot),
        })
    }

    /// Sets the nominal stock levels, persisting them.
    ///
    /// Used once at startup, seeded from the product catalog. Products
    /// already present keep their current level so a restart does not
    /// reset stock that reservations have debited.
    #[tracing::instrument(skip(self, stocks))]
    pub async fn seed(&self, stocks: HashMap<ProductId, u32>) -> Result<()> {
        let mut state = self.state.lock().await;
        for (product_id, quantity) in stocks {
            state.stocks.entry(product_id).or_insert(quantity);
        }
        self.store.persist(&state).await
    }

    /// Atomically checks and reserves a batch of product quantities.
    ///
    /// All-or-nothing: if any product lacks stock the whole batch is
    /// rejected and nothing is recorded. Idempotent: a reservation id
    /// that was already recorded returns `Reserved` again without a
    /// re-check or a second debit.
    #[tracing::instrument(skip(self, lines), fields(%reservation_id))]
    pub async fn reserve(
        &self,
        reservation_id: AggregateId,
        lines: Vec<(ProductId, u32)>,
    ) -> Result<ReserveOutcome> {
        let mut state = self.state.lock().await;

        // Idempotent replay: the recorded outcome stands, whatever the
        // reservation's current status.
        if state.reservations.contains_key(&reservation_id) {
            tracing::debug!(%reservation_id, "reservation replayed");
            return Ok(ReserveOutcome::Reserved);
        }

        // Check the whole batch before touching anything.
        for (product_id, quantity) in &lines {
            let available = state.stocks.get(product_id).copied().unwrap_or(0);
            if available < *quantity {
                metrics::counter!("ledger_reservations_rejected").increment(1);
                return Ok(ReserveOutcome::InsufficientStock {
                    product_id: product_id.clone(),
                    available,
                });
            }
        }

        // Debit every line and record the reservation.
        for (product_id, quantity) in &lines {
            if let Some(stock) = state.stocks.get_mut(product_id) {
                *stock -= quantity;
            }
        }
        state.reservations.insert(
            reservation_id,
            Reservation {
                reservation_id,
                lines: lines
                    .iter()
                    .map(|(product_id, quantity)| ReservationLine {
                        product_id: product_id.clone(),
                        quantity: *quantity,
                    })
                    .collect(),
                status: ReservationStatus::Active,
            },
        );

        // Write-then-acknowledge. If the write fails, undo the in-memory
        // mutation so memory and disk stay in agreement.
        if let Err(e) = self.store.persist(&state).await {
            for (product_id, quantity) in &lines {
                if let Some(stock) = state.stocks.get_mut(product_id) {
                    *stock += quantity;
                }
            }
            state.reservations.remove(&reservation_id);
            return Err(e);
        }

        metrics::counter!("ledger_reservations_total").increment(1);
        Ok(ReserveOutcome::Reserved)
    }

    /// Releases a reservation, crediting its lines back.
    ///
    /// Idempotent: an unknown or already-released id is a success, not
    /// an error — a retry after a crash must not fail.
    #[tracing::instrument(skip(self), fields(%reservation_id))]
    pub async fn release(&self, reservation_id: AggregateId) -> Result<()> {
        let mut state = self.state.lock().await;

        let lines = match state.reservations.get(&reservation_id) {
            None => return Ok(()),
            Some(reservation) if reservation.status == ReservationStatus::Released => {
                return Ok(());
            }
            Some(reservation) => reservation.lines.clone(),
        };

        for line in &lines {
            *state.stocks.entry(line.product_id.clone()).or_insert(0) += line.quantity;
        }
        if let Some(reservation) = state.reservations.get_mut(&reservation_id) {
            reservation.status = ReservationStatus::Released;
        }

        if let Err(e) = self.store.persist(&state).await {
            for line in &lines {
                if let Some(stock) = state.stocks.get_mut(&line.product_id) {
                    *stock -= line.quantity;
                }
            }
            if let Some(reservation) = state.reservations.get_mut(&reservation_id) {
                reservation.status = ReservationStatus::Active;
            }
            return Err(e);
        }

        metrics::counter!("ledger_releases_total").increment(1);
        Ok(())
    }

    /// Returns the current available quantity for a product.
    pub async fn stock_level(&self, product_id: &ProductId) -> u32 {
        self.state
            .lock()
            .await
            .stocks
            .get(product_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the recorded status of a reservation, if any.
    pub async fn reservation_status(
        &self,
        reservation_id: AggregateId,
    ) -> Option<ReservationStatus> {
        self.state
            .lock()
            .await
            .reservations
            .get(&reservation_id)
            .map(|r| r.status)
    }

    /// Returns the number of reservations currently holding stock.
    pub async fn active_reservation_count(&self) -> usize {
        self.state
            .lock()
            .await
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Active)
            .count()
    }
}
