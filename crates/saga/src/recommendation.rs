//! Recommendation refresh job.
//!
//! A recurring background task: it runs once at startup, then again each
//! time it is triggered. Triggers arrive from the order saga on every
//! completed purchase and coalesce — any number of triggers landing
//! while a refresh is in flight produce exactly one more run.

use std::collections::HashMap;
use std::sync::Arc;

use domain::ProductId;
use tokio::sync::Notify;

use crate::retry::StepError;
use crate::services::{OrderStore, RecommendationStore};

/// Handle for signalling the job to run (fire-and-forget, clonable).
#[derive(Clone, Default)]
pub struct RecommendationTrigger {
    wake: Arc<Notify>,
}

impl RecommendationTrigger {
    /// Signals the job to refresh. Concurrent triggers coalesce.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }
}

/// The recommendation refresh job.
pub struct RecommendationJob {
    orders: Arc<dyn OrderStore>,
    sink: Arc<dyn RecommendationStore>,
    trigger: RecommendationTrigger,
}

impl RecommendationJob {
    /// Creates a new job reading from the order store and publishing to
    /// the recommendation store.
    pub fn new(orders: Arc<dyn OrderStore>, sink: Arc<dyn RecommendationStore>) -> Self {
        Self {
            orders,
            sink,
            trigger: RecommendationTrigger::default(),
        }
    }

    /// Returns a clonable trigger handle.
    pub fn trigger_handle(&self) -> RecommendationTrigger {
        self.trigger.clone()
    }

    /// Runs the job loop: refresh once at startup, then once per trigger.
    ///
    /// There is no periodic timer; an untriggered job sleeps forever.
    pub async fn run(self) {
        if let Err(error) = self.refresh_once().await {
            tracing::warn!(%error, "initial recommendation refresh failed");
        }

        loop {
            self.trigger.wake.notified().await;
            if let Err(error) = self.refresh_once().await {
                tracing::warn!(%error, "recommendation refresh failed");
            }
        }
    }

    /// Performs a single refresh: read all historical line items,
    /// aggregate quantity sold per product, rank ascending, republish.
    ///
    /// The full ranked list replaces the prior one atomically; nothing
    /// is filtered out. Returns the published ranking.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_once(&self) -> Result<Vec<ProductId>, StepError> {
        let lines = self.orders.list_line_items().await?;

        let mut counts: HashMap<ProductId, u64> = HashMap::new();
        for line in lines {
            *counts.entry(line.product_id).or_insert(0) += line.quantity as u64;
        }

        // Ascending by quantity sold; product id breaks ties so reruns
        // over the same data publish the same list.
        let mut ranked: Vec<(ProductId, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let ranked: Vec<ProductId> = ranked.into_iter().map(|(product_id, _)| product_id).collect();

        self.sink.replace(ranked.clone()).await?;
        metrics::counter!("recommendation_refreshes").increment(1);
        tracing::info!(products = ranked.len(), "recommendations republished");

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryOrderStore, InMemoryRecommendationStore, OrderLine};
    use common::AggregateId;
    use std::time::Duration;

    async fn add_line(orders: &InMemoryOrderStore, product: &str, quantity: u32) {
        orders
            .append_line_item(OrderLine {
                line_id: AggregateId::new(),
                order_id: AggregateId::new(),
                product_id: ProductId::new(product),
                quantity,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ranking_is_ascending_and_complete() {
        let orders = Arc::new(InMemoryOrderStore::new());
        add_line(&orders, "P1", 5).await;
        add_line(&orders, "P2", 1).await;
        add_line(&orders, "P3", 3).await;
        add_line(&orders, "P1", 2).await;

        let sink = Arc::new(InMemoryRecommendationStore::new());
        let job = RecommendationJob::new(orders, sink.clone());

        let ranked = job.refresh_once().await.unwrap();

        // Least-sold first, nothing filtered out.
        assert_eq!(
            ranked,
            vec![
                ProductId::new("P2"), // 1 sold
                ProductId::new("P3"), // 3 sold
                ProductId::new("P1"), // 7 sold
            ]
        );
        assert_eq!(sink.current().await.unwrap(), ranked);
    }

    #[tokio::test]
    async fn test_refresh_replaces_prior_list() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let sink = Arc::new(InMemoryRecommendationStore::new());
        sink.replace(vec![ProductId::new("stale")]).await.unwrap();

        let job = RecommendationJob::new(orders.clone(), sink.clone());
        add_line(&orders, "P1", 1).await;
        job.refresh_once().await.unwrap();

        assert_eq!(sink.current().await.unwrap(), vec![ProductId::new("P1")]);
    }

    #[tokio::test]
    async fn test_run_refreshes_at_startup_and_on_trigger() {
        let orders = Arc::new(InMemoryOrderStore::new());
        add_line(&orders, "P1", 1).await;

        let sink = Arc::new(InMemoryRecommendationStore::new());
        let job = RecommendationJob::new(orders.clone(), sink.clone());
        let trigger = job.trigger_handle();

        tokio::spawn(job.run());

        // Startup refresh.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.current().await.unwrap(), vec![ProductId::new("P1")]);

        // Triggered refresh picks up new data; repeated triggers coalesce.
        add_line(&orders, "P0", 9).await;
        trigger.trigger();
        trigger.trigger();
        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            sink.current().await.unwrap(),
            vec![ProductId::new("P1"), ProductId::new("P0")]
        );
    }

    #[tokio::test]
    async fn test_empty_history_publishes_empty_list() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let sink = Arc::new(InMemoryRecommendationStore::new());
        let job = RecommendationJob::new(orders, sink.clone());

        let ranked = job.refresh_once().await.unwrap();
        assert!(ranked.is_empty());
    }
}
