//! Catalog listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use event_store::EventStore;
use ledger::LedgerStore;
use saga::ProductListing;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::sessions::AppState;

#[derive(Serialize)]
pub struct CategoryResponse {
    pub category_id: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub product_id: String,
    pub name: String,
    pub price_cents: i64,
}

fn product_response(listing: ProductListing) -> ProductResponse {
    ProductResponse {
        product_id: listing.product_id.to_string(),
        name: listing.name,
        price_cents: listing.price.cents(),
    }
}

/// GET /catalog/categories — category listing.
#[tracing::instrument(skip(state))]
pub async fn categories<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let categories = state
        .catalog
        .list_categories()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(
        categories
            .into_iter()
            .map(|c| CategoryResponse {
                category_id: c.category_id,
                name: c.name,
            })
            .collect(),
    ))
}

/// GET /catalog/categories/{category_id}/products — products in a category.
#[tracing::instrument(skip(state))]
pub async fn category_products<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(category_id): Path<String>,
) -> Result<Json<Vec<ProductResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let products = state
        .catalog
        .products_in_category(&category_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(products.into_iter().map(product_response).collect()))
}

/// GET /catalog/products — the full product listing.
#[tracing::instrument(skip(state))]
pub async fn products<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let products = state
        .catalog
        .list_products()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(products.into_iter().map(product_response).collect()))
}
