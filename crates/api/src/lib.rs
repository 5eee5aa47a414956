//! HTTP surface for the checkout core.
//!
//! Exposes the saga-facing interface to the web layer: session signals
//! and queries, login start/poll, shipping status and recommendations,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{CartService, Money};
use event_store::{EventStore, InMemoryEventStore};
use ledger::{InMemoryLedgerStore, LedgerStore, ReservationLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use rand::Rng;
use saga::{
    CatalogClient, CheckoutCoordinator, Collaborators, InMemoryCatalog, InMemoryImageStore, InMemoryOrderStore,
    InMemoryRecommendationStore, InMemoryUserDirectory, LoginService, RecommendationJob,
    RetryPolicy, SessionRegistry, ShippingConfig, ShippingSubSaga, ShippingTracker,
    SimulatedPaymentGateway, TracingNotifier,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::sessions::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    L: LedgerStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/sessions/{session_id}", post(routes::sessions::start::<S, L>))
        .route("/sessions/{session_id}", get(routes::sessions::get::<S, L>))
        .route(
            "/sessions/{session_id}/cart",
            get(routes::sessions::cart_items::<S, L>),
        )
        .route(
            "/sessions/{session_id}/cart",
            put(routes::sessions::revise_cart::<S, L>),
        )
        .route(
            "/sessions/{session_id}/cart/items",
            post(routes::sessions::add_item::<S, L>),
        )
        .route(
            "/sessions/{session_id}/cart/items/{product_id}",
            delete(routes::sessions::remove_item::<S, L>),
        )
        .route(
            "/sessions/{session_id}/user",
            post(routes::sessions::assign_user::<S, L>),
        )
        .route(
            "/sessions/{session_id}/checkout",
            post(routes::sessions::checkout::<S, L>),
        )
        .route(
            "/sessions/{session_id}/login",
            post(routes::login::start::<S, L>),
        )
        .route(
            "/sessions/{session_id}/login",
            get(routes::login::poll::<S, L>),
        )
        .route(
            "/shipping/{workflow_id}",
            get(routes::shipping::status::<S, L>),
        )
        .route(
            "/recommendations",
            get(routes::recommendations::list::<S, L>),
        )
        .route("/catalog/products", get(routes::catalog::products::<S, L>))
        .route(
            "/catalog/categories",
            get(routes::catalog::categories::<S, L>),
        )
        .route(
            "/catalog/categories/{category_id}/products",
            get(routes::catalog::category_products::<S, L>),
        )
        .route("/images", get(routes::images::fetch::<S, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// The in-memory collaborators backing the default wiring, exposed so
/// tests (and demos) can inspect and steer them.
pub struct DefaultServices {
    pub catalog: InMemoryCatalog,
    pub payment: SimulatedPaymentGateway,
    pub orders: Arc<InMemoryOrderStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub ledger: Arc<ReservationLedger<InMemoryLedgerStore>>,
    pub recommendations: Arc<InMemoryRecommendationStore>,
    pub images: InMemoryImageStore,
}

/// Creates the default application state: in-memory stores, a seeded
/// catalog and user directory, stock seeded per product, the simulated
/// payment gateway, and a running recommendation job.
pub async fn create_default_state(
    store: InMemoryEventStore,
) -> (
    Arc<AppState<InMemoryEventStore, InMemoryLedgerStore>>,
    DefaultServices,
) {
    let carts = Arc::new(CartService::new(store.clone()));

    let catalog = InMemoryCatalog::new();
    catalog.add_category("input", "Input Devices");
    catalog.add_category("accessories", "Accessories");
    catalog.add_product_in_category("P1", "Mechanical Keyboard", Money::from_cents(8900), "input");
    catalog.add_product_in_category("P2", "Trackball Mouse", Money::from_cents(4500), "input");
    catalog.add_product_in_category("P3", "USB-C Dock", Money::from_cents(12900), "accessories");
    catalog.add_product_in_category("P4", "Webcam Cover", Money::from_cents(250), "accessories");

    // 1x1 transparent PNG stand-in for every product image.
    const PLACEHOLDER_PNG: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
    let images = InMemoryImageStore::new();
    for listing in catalog.list_products().await.unwrap_or_default() {
        images.add_image(format!("{}.png", listing.product_id), PLACEHOLDER_PNG);
    }

    let ledger = Arc::new(ReservationLedger::new(InMemoryLedgerStore::new()));
    let listings = catalog.list_products().await.unwrap_or_default();
    let mut stocks = HashMap::new();
    {
        let mut rng = rand::thread_rng();
        for listing in listings {
            stocks.insert(listing.product_id, rng.gen_range(0..=100));
        }
    }
    if let Err(error) = ledger.seed(stocks).await {
        tracing::warn!(%error, "failed to seed stock levels");
    }

    let orders = Arc::new(InMemoryOrderStore::new());
    let users = Arc::new(InMemoryUserDirectory::with_defaults());
    let payment = SimulatedPaymentGateway::default();
    let recommendations = Arc::new(InMemoryRecommendationStore::new());

    let tracker = ShippingTracker::new();
    let shipping = ShippingSubSaga::new(
        tracker.clone(),
        orders.clone(),
        RetryPolicy::default(),
        ShippingConfig::default(),
    );

    let job = RecommendationJob::new(orders.clone(), recommendations.clone());
    let trigger = job.trigger_handle();
    tokio::spawn(job.run());

    let coordinator = Arc::new(CheckoutCoordinator::new(
        store,
        ledger.clone(),
        Collaborators {
            catalog: Arc::new(catalog.clone()),
            payment: Arc::new(payment.clone()),
            orders: orders.clone(),
            users: users.clone(),
            notifier: Arc::new(TracingNotifier),
        },
        shipping,
        trigger,
        RetryPolicy::default(),
    ));

    let registry = SessionRegistry::new(carts, coordinator);
    let login = LoginService::new(users.clone(), RetryPolicy::default());

    let state = Arc::new(AppState {
        registry,
        login,
        shipping_tracker: tracker,
        recommendations: recommendations.clone(),
        catalog: Arc::new(catalog.clone()),
        images: Arc::new(images.clone()),
    });

    (
        state,
        DefaultServices {
            catalog,
            payment,
            orders,
            users,
            ledger,
            recommendations,
            images,
        },
    )
}
