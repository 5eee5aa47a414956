//! Shipping sub-saga: a timed three-stage delivery state machine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use common::AggregateId;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::retry::{RetryPolicy, run_with_retries};
use crate::services::OrderStore;

/// Delivery stage of a shipping sub-saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingStatus {
    /// Order is being prepared.
    Processing,
    /// Order is on its way.
    Shipping,
    /// Order was delivered.
    Shipped,
}

impl ShippingStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Processing => "Processing",
            ShippingStatus::Shipping => "Shipping",
            ShippingStatus::Shipped => "Shipped",
        }
    }
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timing configuration for the delivery stages.
#[derive(Debug, Clone)]
pub struct ShippingConfig {
    /// Delay between each delivery stage.
    pub stage_delay: Duration,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            stage_delay: Duration::from_secs(10),
        }
    }
}

/// Tracks the last observed status of every shipping workflow.
///
/// Statuses outlive their sub-saga task: a query after termination
/// still returns `Shipped`.
#[derive(Debug, Clone, Default)]
pub struct ShippingTracker {
    statuses: Arc<RwLock<HashMap<String, ShippingStatus>>>,
}

impl ShippingTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last known status of a shipping workflow.
    pub fn status(&self, workflow_id: &str) -> Option<ShippingStatus> {
        self.statuses.read().unwrap().get(workflow_id).copied()
    }

    fn set(&self, workflow_id: &str, status: ShippingStatus) {
        self.statuses
            .write()
            .unwrap()
            .insert(workflow_id.to_string(), status);
    }
}

/// Spawns and drives shipping sub-sagas.
///
/// Each dispatched workflow walks Processing → Shipping → Shipped on a
/// timer, then reports back to the order store by setting the order's
/// shipping flag (idempotent, so re-dispatching after a crash is safe).
#[derive(Clone)]
pub struct ShippingSubSaga {
    tracker: ShippingTracker,
    orders: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    config: ShippingConfig,
}

impl ShippingSubSaga {
    /// Creates a new shipping sub-saga runner.
    pub fn new(
        tracker: ShippingTracker,
        orders: Arc<dyn OrderStore>,
        retry: RetryPolicy,
        config: ShippingConfig,
    ) -> Self {
        Self {
            tracker,
            orders,
            retry,
            config,
        }
    }

    /// Returns the tracker serving status queries.
    pub fn tracker(&self) -> &ShippingTracker {
        &self.tracker
    }

    /// Spawns the sub-saga for an order as a child task.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub fn dispatch(&self, workflow_id: String, order_id: AggregateId) -> JoinHandle<()> {
        let tracker = self.tracker.clone();
        let orders = self.orders.clone();
        let retry = self.retry.clone();
        let stage_delay = self.config.stage_delay;

        tokio::spawn(async move {
            tracker.set(&workflow_id, ShippingStatus::Processing);

            tokio::time::sleep(stage_delay).await;
            tracker.set(&workflow_id, ShippingStatus::Shipping);

            tokio::time::sleep(stage_delay).await;
            tracker.set(&workflow_id, ShippingStatus::Shipped);

            let result = run_with_retries(&retry, "set_shipping_done", || {
                let orders = orders.clone();
                async move { orders.mark_shipping_done(order_id).await }
            })
            .await;

            match result {
                Ok(()) => {
                    metrics::counter!("shipping_completed").increment(1);
                    tracing::info!(%workflow_id, %order_id, "shipping completed");
                }
                Err(error) => {
                    tracing::error!(%workflow_id, %order_id, %error, "failed to report shipping completion");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryOrderStore, OrderRecord};
    use domain::{CheckoutInfo, Money, UserId};

    fn sub_saga(orders: Arc<InMemoryOrderStore>) -> ShippingSubSaga {
        ShippingSubSaga::new(
            ShippingTracker::new(),
            orders,
            RetryPolicy::immediate(3),
            ShippingConfig {
                stage_delay: Duration::from_millis(5),
            },
        )
    }

    async fn stored_order(orders: &InMemoryOrderStore) -> AggregateId {
        let order_id = AggregateId::new();
        orders
            .create_order(OrderRecord {
                order_id,
                user_id: UserId::new("1"),
                total_price: Money::from_cents(1000),
                checkout: CheckoutInfo::default(),
                shipping_workflow_id: "shipping:s-1".to_string(),
                shipping_done: false,
            })
            .await
            .unwrap();
        order_id
    }

    #[tokio::test]
    async fn test_walks_all_stages_and_marks_order() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let order_id = stored_order(&orders).await;
        let saga = sub_saga(orders.clone());

        let handle = saga.dispatch("shipping:s-1".to_string(), order_id);
        handle.await.unwrap();

        assert_eq!(
            saga.tracker().status("shipping:s-1"),
            Some(ShippingStatus::Shipped)
        );
        let order = orders.get_order(order_id).await.unwrap().unwrap();
        assert!(order.shipping_done);
    }

    #[tokio::test]
    async fn test_status_survives_termination() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let order_id = stored_order(&orders).await;
        let saga = sub_saga(orders);

        saga.dispatch("shipping:s-1".to_string(), order_id)
            .await
            .unwrap();

        // The task is gone; the last status is still readable.
        assert_eq!(
            saga.tracker().status("shipping:s-1"),
            Some(ShippingStatus::Shipped)
        );
    }

    #[tokio::test]
    async fn test_redispatch_is_idempotent() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let order_id = stored_order(&orders).await;
        let saga = sub_saga(orders.clone());

        saga.dispatch("shipping:s-1".to_string(), order_id)
            .await
            .unwrap();
        saga.dispatch("shipping:s-1".to_string(), order_id)
            .await
            .unwrap();

        let order = orders.get_order(order_id).await.unwrap().unwrap();
        assert!(order.shipping_done);
    }

    #[tokio::test]
    async fn test_unknown_workflow_has_no_status() {
        let tracker = ShippingTracker::new();
        assert_eq!(tracker.status("shipping:unknown"), None);
    }
}
