//! Recommendations endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use event_store::EventStore;
use ledger::LedgerStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::sessions::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    /// How many products to return (default 3).
    pub num: Option<usize>,
}

/// GET /recommendations — the top of the published ranking.
#[tracing::instrument(skip(state))]
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let mut ranked = state
        .recommendations
        .current()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    ranked.truncate(params.num.unwrap_or(3));

    Ok(Json(
        ranked.into_iter().map(|id| id.to_string()).collect(),
    ))
}
