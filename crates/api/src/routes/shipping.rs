//! Shipping status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use event_store::EventStore;
use ledger::LedgerStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::sessions::AppState;

#[derive(Serialize)]
pub struct ShippingStatusResponse {
    pub workflow_id: String,
    pub status: String,
}

/// GET /shipping/{workflow_id} — last known delivery stage.
///
/// Works at any point in the sub-saga's lifetime, including after it
/// terminated.
#[tracing::instrument(skip(state))]
pub async fn status<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<ShippingStatusResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let status = state
        .shipping_tracker
        .status(&workflow_id)
        .ok_or_else(|| ApiError::NotFound(format!("No shipping workflow {workflow_id}")))?;

    Ok(Json(ShippingStatusResponse {
        workflow_id,
        status: status.to_string(),
    }))
}
