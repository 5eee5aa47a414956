//! PostgreSQL-backed ledger store.

use std::collections::HashMap;

use async_trait::async_trait;
use common::AggregateId;
use domain::ProductId;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{LedgerSnapshot, LedgerStore, Reservation, ReservationLine, ReservationStatus};

/// PostgreSQL implementation of the ledger store.
///
/// The ledger is small (one row per product, one per reservation ever
/// made), so `persist` rewrites both tables inside one transaction —
/// the commit is the durability point, and the two tables can never
/// diverge on disk.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn persist(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM stock_levels")
            .execute(&mut *tx)
            .await?;
        for (product_id, quantity) in &snapshot.stocks {
            sqlx::query("INSERT INTO stock_levels (product_id, quantity) VALUES ($1, $2)")
                .bind(product_id.as_str())
                .bind(*quantity as i64)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM reservations")
            .execute(&mut *tx)
            .await?;
        for reservation in snapshot.reservations.values() {
            let lines = serde_json::to_value(&reservation.lines)?;
            let status = match reservation.status {
                ReservationStatus::Active => "active",
                ReservationStatus::Released => "released",
            };
            sqlx::query(
                "INSERT INTO reservations (reservation_id, lines, status) VALUES ($1, $2, $3)",
            )
            .bind(reservation.reservation_id.as_uuid())
            .bind(lines)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let stock_rows = sqlx::query("SELECT product_id, quantity FROM stock_levels")
            .fetch_all(&self.pool)
            .await?;
        let reservation_rows =
            sqlx::query("SELECT reservation_id, lines, status FROM reservations")
                .fetch_all(&self.pool)
                .await?;

        if stock_rows.is_empty() && reservation_rows.is_empty() {
            return Ok(None);
        }

        let mut stocks = HashMap::new();
        for row in stock_rows {
            let product_id: String = row.try_get("product_id")?;
            let quantity: i64 = row.try_get("quantity")?;
            stocks.insert(ProductId::new(product_id), quantity as u32);
        }

        let mut reservations = HashMap::new();
        for row in reservation_rows {
            let reservation_id = AggregateId::from_uuid(row.try_get::<Uuid, _>("reservation_id")?);
            let lines: Vec<ReservationLine> = serde_json::from_value(row.try_get("lines")?)?;
            let status: String = row.try_get("status")?;
            let status = if status == "released" {
                ReservationStatus::Released
            } else {
                ReservationStatus::Active
            };
            reservations.insert(
                reservation_id,
                Reservation {
                    reservation_id,
                    lines,
                    status,
                },
            );
        }

        Ok(Some(LedgerSnapshot {
            stocks,
            reservations,
        }))
    }
}
