//! End-to-end checkout tests over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, SessionId};
use domain::{
    AddItem, AssignUser, CartService, CartState, CheckoutInfo, DomainEvent, Money, ProductId,
    StageCheckout, UserId,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use ledger::{InMemoryLedgerStore, ReservationLedger, ReservationStatus};
use saga::{
    CartSignal, CheckoutCoordinator, CheckoutEvent, CheckoutState, Collaborators, InMemoryCatalog,
    InMemoryOrderStore, InMemoryRecommendationStore, InMemoryUserDirectory, OrderStore,
    RecommendationJob, RecommendationStore, RecordingNotifier, RetryPolicy, SessionRegistry,
    ShippingConfig, ShippingStatus, ShippingSubSaga, ShippingTracker, SimulatedPaymentGateway,
    steps,
};

struct Harness {
    carts: Arc<CartService<InMemoryEventStore>>,
    coordinator: Arc<CheckoutCoordinator<InMemoryEventStore, InMemoryLedgerStore>>,
    registry: SessionRegistry<InMemoryEventStore, InMemoryLedgerStore>,
    store: InMemoryEventStore,
    ledger: Arc<ReservationLedger<InMemoryLedgerStore>>,
    catalog: InMemoryCatalog,
    payment: SimulatedPaymentGateway,
    orders: Arc<InMemoryOrderStore>,
    notifier: RecordingNotifier,
    recommendations: Arc<InMemoryRecommendationStore>,
    tracker: ShippingTracker,
}

async fn harness(stock: &[(&str, u32)], payment: SimulatedPaymentGateway) -> Harness {
    let store = InMemoryEventStore::new();
    let carts = Arc::new(CartService::new(store.clone()));

    let ledger = Arc::new(ReservationLedger::new(InMemoryLedgerStore::new()));
    ledger
        .seed(
            stock
                .iter()
                .map(|(id, qty)| (ProductId::new(*id), *qty))
                .collect(),
        )
        .await
        .unwrap();

    let catalog = InMemoryCatalog::new();
    catalog.add_product("P1", "Widget", Money::from_cents(1000));
    catalog.add_product("P2", "Gadget", Money::from_cents(250));

    let orders = Arc::new(InMemoryOrderStore::new());
    let users = Arc::new(InMemoryUserDirectory::with_defaults());
    let notifier = RecordingNotifier::new();
    let recommendations = Arc::new(InMemoryRecommendationStore::new());

    let tracker = ShippingTracker::new();
    let shipping = ShippingSubSaga::new(
        tracker.clone(),
        orders.clone(),
        RetryPolicy::immediate(3),
        ShippingConfig {
            stage_delay: Duration::from_millis(5),
        },
    );

    let job = RecommendationJob::new(orders.clone(), recommendations.clone());
    let trigger = job.trigger_handle();
    tokio::spawn(job.run());

    let coordinator = Arc::new(CheckoutCoordinator::new(
        store.clone(),
        ledger.clone(),
        Collaborators {
            catalog: Arc::new(catalog.clone()),
            payment: Arc::new(payment.clone()),
            orders: orders.clone(),
            users,
            notifier: Arc::new(notifier.clone()),
        },
        shipping,
        trigger,
        RetryPolicy::new(3, Duration::from_millis(50)),
    ));

    let registry = SessionRegistry::new(carts.clone(), coordinator.clone());

    Harness {
        carts,
        coordinator,
        registry,
        store,
        ledger,
        catalog,
        payment,
        orders,
        notifier,
        recommendations,
        tracker,
    }
}

fn checkout_info() -> CheckoutInfo {
    CheckoutInfo {
        recipient: "Alice Smith".to_string(),
        address1: "1 Main St".to_string(),
        address2: String::new(),
        card_company: "Visa".to_string(),
        card_number: "4111111111111111".to_string(),
        card_expiry: "12/30".to_string(),
    }
}

/// Opens a session and walks it to Submitted through the cart service.
async fn submitted_session(h: &Harness, items: &[(&str, u32)]) -> SessionId {
    let session_id = SessionId::new();
    h.carts
        .open_session(domain::OpenSession::new(session_id.clone(), None))
        .await
        .unwrap();
    for (product, quantity) in items {
        for _ in 0..*quantity {
            h.carts
                .add_item(AddItem::new(session_id.clone(), *product))
                .await
                .unwrap();
        }
    }
    h.carts
        .assign_user(AssignUser::new(session_id.clone(), UserId::new("1")))
        .await
        .unwrap();
    let result = h
        .carts
        .stage_checkout(StageCheckout::new(session_id.clone(), checkout_info()))
        .await
        .unwrap();
    assert_eq!(result.aggregate.state(), CartState::Submitted);
    session_id
}

#[tokio::test]
async fn happy_path_completes_order_and_ships() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = submitted_session(&h, &[("P1", 1)]).await;

    let saga_id = h.coordinator.execute(&session_id).await.unwrap();

    // Saga record
    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), CheckoutState::Completed);
    assert!(saga.has_completed(steps::STEP_RESERVE_STOCK));
    assert!(saga.has_completed(steps::STEP_CHARGE_PAYMENT));
    assert!(saga.has_completed(steps::STEP_DISPATCH_SHIPPING));

    // Cart session
    let cart = h.carts.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(cart.state(), CartState::Completed);
    assert_eq!(cart.info().total_price, Some(Money::from_cents(1000)));
    let order_id = cart.info().order_id.unwrap();

    // Ledger: one unit held
    assert_eq!(h.ledger.stock_level(&ProductId::new("P1")).await, 4);
    assert_eq!(h.ledger.active_reservation_count().await, 1);

    // Order store
    let order = h.orders.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.total_price, Money::from_cents(1000));
    assert_eq!(h.orders.line_count(), 1);

    // Confirmation email
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address, "alice@example.com");
    assert!(sent[0].body.contains("Alice Smith"));

    // Shipping sub-saga walks to Shipped and flips the order flag
    let workflow_id = session_id.shipping_workflow_id();
    for _ in 0..200 {
        if h.tracker.status(&workflow_id) == Some(ShippingStatus::Shipped) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.tracker.status(&workflow_id), Some(ShippingStatus::Shipped));
    for _ in 0..200 {
        if h.orders.get_order(order_id).await.unwrap().unwrap().shipping_done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.orders.get_order(order_id).await.unwrap().unwrap().shipping_done);
}

#[tokio::test]
async fn insufficient_stock_fails_without_compensation() {
    let h = harness(&[("P1", 2)], SimulatedPaymentGateway::approving()).await;
    let session_id = submitted_session(&h, &[("P1", 3)]).await;

    let saga_id = h.coordinator.execute(&session_id).await.unwrap();

    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), CheckoutState::Failed);
    assert!(saga.completed_steps().is_empty());
    assert!(saga.failure_reason().unwrap().contains("insufficient stock"));

    // Nothing debited, nothing recorded, no order.
    assert_eq!(h.ledger.stock_level(&ProductId::new("P1")).await, 2);
    assert_eq!(h.ledger.active_reservation_count().await, 0);
    assert_eq!(h.orders.order_count(), 0);

    let cart = h.carts.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(cart.state(), CartState::Failed);
}

#[tokio::test]
async fn declined_payment_releases_reservation() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::declining()).await;
    let session_id = submitted_session(&h, &[("P1", 2)]).await;

    let saga_id = h.coordinator.execute(&session_id).await.unwrap();

    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), CheckoutState::Failed);
    assert_eq!(
        saga.completed_steps(),
        &[steps::STEP_RESERVE_STOCK, steps::STEP_PRICE_ORDER]
    );
    assert!(saga.failure_reason().unwrap().contains("payment declined"));

    // Reserve-then-release nets to zero; the reservation record remains.
    assert_eq!(h.ledger.stock_level(&ProductId::new("P1")).await, 5);
    let reservation_id = saga.reservation_id().unwrap();
    assert_eq!(
        h.ledger.reservation_status(reservation_id).await,
        Some(ReservationStatus::Released)
    );

    // The order store never saw this purchase.
    assert_eq!(h.orders.order_count(), 0);
    assert_eq!(h.orders.line_count(), 0);

    let cart = h.carts.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(cart.state(), CartState::Failed);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn transient_catalog_failures_are_retried() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;
    // The catalog flaps; the pricing step retries through it (retry
    // backoff is 50ms, the catalog recovers after 10ms).
    let session_id = submitted_session(&h, &[("P1", 1)]).await;
    h.catalog.set_fail_on_lookup(true);

    let flaky = h.catalog.clone();
    let flip = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        flaky.set_fail_on_lookup(false);
    });

    let saga_id = h.coordinator.execute(&session_id).await.unwrap();
    flip.await.unwrap();

    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), CheckoutState::Completed);
    assert_eq!(h.payment.charge_count(), 1);
}

#[tokio::test]
async fn rerunning_a_completed_saga_changes_nothing() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = submitted_session(&h, &[("P1", 1)]).await;

    h.coordinator.execute(&session_id).await.unwrap();
    let stock_after_first = h.ledger.stock_level(&ProductId::new("P1")).await;
    let emails_after_first = h.notifier.sent().len();

    h.coordinator.execute(&session_id).await.unwrap();

    assert_eq!(
        h.ledger.stock_level(&ProductId::new("P1")).await,
        stock_after_first
    );
    assert_eq!(h.orders.order_count(), 1);
    assert_eq!(h.orders.line_count(), 1);
    assert_eq!(h.notifier.sent().len(), emails_after_first);
}

/// A crash after the reservation step was checkpointed: the replay must
/// skip the completed step (no double debit) and finish the rest.
#[tokio::test]
async fn replay_after_crash_skips_checkpointed_steps() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = submitted_session(&h, &[("P1", 2)]).await;

    // Reproduce what a process did before dying: it reserved stock and
    // checkpointed that step on the saga record.
    let saga_id = session_id.checkout_id();
    let reservation_id = AggregateId::derived(&format!("reservation:{session_id}"));
    h.ledger
        .reserve(reservation_id, vec![(ProductId::new("P1"), 2)])
        .await
        .unwrap();

    let events = vec![
        CheckoutEvent::saga_started(saga_id, session_id.clone(), steps::SAGA_TYPE),
        CheckoutEvent::step_started(steps::STEP_RESERVE_STOCK),
        CheckoutEvent::step_completed_with_reservation(steps::STEP_RESERVE_STOCK, reservation_id),
    ];
    let mut version = Version::initial();
    for event in &events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(saga_id)
            .aggregate_type("CheckoutSaga")
            .version(version)
            .payload(event)
            .unwrap()
            .build();
        h.store
            .append(vec![envelope], AppendOptions::new())
            .await
            .unwrap();
    }
    assert_eq!(h.ledger.stock_level(&ProductId::new("P1")).await, 3);

    // "Restart": re-execute the whole pipeline.
    let executed_saga_id = h.coordinator.execute(&session_id).await.unwrap();
    assert_eq!(executed_saga_id, saga_id);

    let saga = h.coordinator.get_saga(saga_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), CheckoutState::Completed);

    // Stock was debited exactly once.
    assert_eq!(h.ledger.stock_level(&ProductId::new("P1")).await, 3);
    assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test]
async fn registry_runs_pipeline_on_submission() {
    let h = harness(&[("P1", 5), ("P2", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = SessionId::new();

    let handle = h.registry.start(session_id.clone(), None).await.unwrap();
    handle
        .signal(CartSignal::AddItem(ProductId::new("P1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::AddItem(ProductId::new("P1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::AddItem(ProductId::new("P2")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::AssignUser(UserId::new("1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::StageCheckout(checkout_info()))
        .await
        .unwrap();

    assert!(
        handle
            .wait_until(Duration::from_secs(5), |view| view.state
                == CartState::Completed)
            .await
    );

    let view = handle.view();
    // 2 × $10.00 + 1 × $2.50
    assert_eq!(view.info.total_price, Some(Money::from_cents(2250)));
    assert!(view.info.order_id.is_some());
    assert_eq!(h.orders.order_count(), 1);
    assert_eq!(h.orders.line_count(), 2);
}

#[tokio::test]
async fn signals_after_submission_do_not_change_the_cart() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = SessionId::new();

    let handle = h.registry.start(session_id.clone(), None).await.unwrap();
    handle
        .signal(CartSignal::AddItem(ProductId::new("P1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::AssignUser(UserId::new("1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::StageCheckout(checkout_info()))
        .await
        .unwrap();
    assert!(
        handle
            .wait_until(Duration::from_secs(5), |view| view.state.is_terminal())
            .await
    );

    handle
        .signal(CartSignal::AddItem(ProductId::new("P1")))
        .await
        .unwrap();
    handle
        .signal(CartSignal::RemoveItem(ProductId::new("P1")))
        .await
        .unwrap();

    // Give the actor time to swallow the no-ops.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let items = handle.cart_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 1);
}

#[tokio::test]
async fn attaching_a_submitted_session_resumes_its_pipeline() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::approving()).await;

    // The session reached Submitted, then the process died before the
    // pipeline ran (no actor exists for it).
    let session_id = submitted_session(&h, &[("P1", 1)]).await;

    // Attaching after the "restart" re-drives the pipeline.
    let handle = h.registry.start(session_id.clone(), None).await.unwrap();
    assert!(
        handle
            .wait_until(Duration::from_secs(5), |view| view.state
                == CartState::Completed)
            .await
    );
    assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test]
async fn completed_checkout_refreshes_recommendations() {
    let h = harness(&[("P1", 5), ("P2", 5)], SimulatedPaymentGateway::approving()).await;
    let session_id = submitted_session(&h, &[("P1", 2), ("P2", 1)]).await;

    h.coordinator.execute(&session_id).await.unwrap();

    // The job coalesces the trigger and republishes ascending by sales.
    let mut published = Vec::new();
    for _ in 0..200 {
        published = h.recommendations.current().await.unwrap();
        if !published.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        published,
        vec![ProductId::new("P2"), ProductId::new("P1")]
    );
}

#[tokio::test]
async fn failed_checkout_leaves_no_order_for_user() {
    let h = harness(&[("P1", 5)], SimulatedPaymentGateway::declining()).await;
    let session_id = submitted_session(&h, &[("P1", 1)]).await;

    h.coordinator.execute(&session_id).await.unwrap();

    let orders = h.orders.orders_for_user(&UserId::new("1")).await.unwrap();
    assert!(orders.is_empty());
}
