//! Recommendation store adapter: the published ranked product list.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::ProductId;

use crate::retry::StepError;

/// Trait for the recommendation list store.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Atomically replaces the published list with a new ranking.
    async fn replace(&self, ranked: Vec<ProductId>) -> Result<(), StepError>;

    /// Returns the currently published ranking.
    async fn current(&self) -> Result<Vec<ProductId>, StepError>;
}

/// In-memory recommendation store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecommendationStore {
    ranked: Arc<RwLock<Vec<ProductId>>>,
}

impl InMemoryRecommendationStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryRecommendationStore {
    async fn replace(&self, ranked: Vec<ProductId>) -> Result<(), StepError> {
        *self.ranked.write().unwrap() = ranked;
        Ok(())
    }

    async fn current(&self) -> Result<Vec<ProductId>, StepError> {
        Ok(self.ranked.read().unwrap().clone())
    }
}
