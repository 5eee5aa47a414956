//! Session signal and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::SessionId;
use domain::{CartItem, CheckoutInfo, ProductId, UserId};
use event_store::EventStore;
use ledger::LedgerStore;
use saga::{
    CartSignal, CartView, CatalogClient, ImageStore, LoginService, RecommendationStore,
    SessionRegistry, ShippingTracker,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    pub registry: SessionRegistry<S, L>,
    pub login: LoginService,
    pub shipping_tracker: ShippingTracker,
    pub recommendations: Arc<dyn RecommendationStore>,
    pub catalog: Arc<dyn CatalogClient>,
    pub images: Arc<dyn ImageStore>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct StartSessionRequest {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
}

#[derive(Deserialize)]
pub struct ReviseCartRequest {
    pub items: Vec<CartItemRequest>,
}

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct AssignUserRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub recipient: String,
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    pub card_company: String,
    pub card_number: String,
    pub card_expiry: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: String,
    pub items: Vec<CartItemResponse>,
    pub user_id: Option<String>,
    pub total_price_cents: Option<i64>,
    pub order_id: Option<String>,
}

fn session_response(session_id: &SessionId, view: &CartView) -> SessionResponse {
    SessionResponse {
        session_id: session_id.to_string(),
        state: view.state.to_string(),
        items: items_response(&view.items),
        user_id: view.info.user_id.as_ref().map(|u| u.to_string()),
        total_price_cents: view.info.total_price.map(|m| m.cents()),
        order_id: view.info.order_id.map(|id| id.to_string()),
    }
}

fn items_response(items: &[CartItem]) -> Vec<CartItemResponse> {
    items
        .iter()
        .map(|item| CartItemResponse {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
        })
        .collect()
}

// -- Handlers --

/// POST /sessions/{session_id} — create or attach to a session.
#[tracing::instrument(skip(state, req))]
pub async fn start<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let user_id = match req.user_id {
        Some(id) if !id.is_empty() => Some(UserId::new(id)),
        _ => None,
    };

    let handle = state.registry.start(session_id.clone(), user_id).await?;
    let view = handle.view();

    Ok((
        StatusCode::CREATED,
        Json(session_response(&session_id, &view)),
    ))
}

/// GET /sessions/{session_id} — session state and order info.
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let handle = attach(&state, &session_id).await?;
    Ok(Json(session_response(&session_id, &handle.view())))
}

/// GET /sessions/{session_id}/cart — cart lines.
#[tracing::instrument(skip(state))]
pub async fn cart_items<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<CartItemResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let handle = attach(&state, &session_id).await?;
    Ok(Json(items_response(&handle.cart_items())))
}

/// POST /sessions/{session_id}/cart/items — add one unit of a product.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    if req.product_id.is_empty() {
        return Err(ApiError::BadRequest("product_id is required".to_string()));
    }

    let handle = attach(&state, &session_id).await?;
    handle
        .signal(CartSignal::AddItem(ProductId::new(req.product_id)))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /sessions/{session_id}/cart/items/{product_id} — drop a line.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path((session_id, product_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let handle = attach(&state, &session_id).await?;
    handle
        .signal(CartSignal::RemoveItem(ProductId::new(product_id)))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// PUT /sessions/{session_id}/cart — replace line quantities.
#[tracing::instrument(skip(state, req))]
pub async fn revise_cart<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<ReviseCartRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    let items: Vec<CartItem> = req
        .items
        .into_iter()
        .map(|item| CartItem::new(item.product_id, item.quantity))
        .collect();

    let handle = attach(&state, &session_id).await?;
    handle.signal(CartSignal::ReviseItems(items)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /sessions/{session_id}/user — attach a user.
#[tracing::instrument(skip(state, req))]
pub async fn assign_user<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<AssignUserRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    if req.user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }

    let handle = attach(&state, &session_id).await?;
    handle
        .signal(CartSignal::AssignUser(UserId::new(req.user_id)))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /sessions/{session_id}/checkout — stage checkout data.
///
/// Fire-and-forget like every other signal: the submission guard fires
/// inside the session actor once both checkout data and a user exist.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(session_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let session_id = parse_session_id(&session_id)?;
    if req.recipient.is_empty() || req.address1.is_empty() {
        return Err(ApiError::BadRequest(
            "recipient and address1 are required".to_string(),
        ));
    }

    let info = CheckoutInfo {
        recipient: req.recipient,
        address1: req.address1,
        address2: req.address2,
        card_company: req.card_company,
        card_number: req.card_number,
        card_expiry: req.card_expiry,
    };

    let handle = attach(&state, &session_id).await?;
    handle.signal(CartSignal::StageCheckout(info)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn attach<S, L>(
    state: &AppState<S, L>,
    session_id: &SessionId,
) -> Result<saga::SessionHandle, ApiError>
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    Ok(state.registry.start(session_id.clone(), None).await?)
}

pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::BadRequest("session id is required".to_string()));
    }
    Ok(SessionId::from_string(raw))
}
