//! Image batch-fetch endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use event_store::EventStore;
use ledger::LedgerStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::sessions::AppState;

#[derive(Debug, Deserialize)]
pub struct ImageParams {
    /// Comma-separated image names.
    pub names: String,
}

/// GET /images?names=a,b — batch fetch of encoded images.
///
/// Missing names are omitted from the response; the caller substitutes
/// a placeholder.
#[tracing::instrument(skip(state))]
pub async fn fetch<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Query(params): Query<ImageParams>,
) -> Result<Json<HashMap<String, String>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let names: Vec<String> = params
        .names
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    let images = state
        .images
        .fetch(&names)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(images))
}
