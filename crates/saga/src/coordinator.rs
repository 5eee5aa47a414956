//! Checkout coordinator: drives the post-submission pipeline.

use std::sync::Arc;

use common::{AggregateId, SessionId};
use domain::{Aggregate, CartService, CartState, DomainEvent, Money, ProductId};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use ledger::{LedgerStore, ReservationLedger, ReserveOutcome};

use crate::error::SagaError;
use crate::events::CheckoutEvent;
use crate::instance::CheckoutSaga;
use crate::retry::{RetryPolicy, StepError, run_with_retries};
use crate::services::{
    CatalogClient, Message, Notifier, OrderLine, OrderRecord, OrderStore, PaymentGateway,
    UserDirectory,
};
use crate::shipping::ShippingSubSaga;
use crate::state::CheckoutState;
use crate::steps;
use crate::recommendation::RecommendationTrigger;

/// The remote collaborators the pipeline calls into.
#[derive(Clone)]
pub struct Collaborators {
    /// Catalog: bulk price lookup.
    pub catalog: Arc<dyn CatalogClient>,
    /// Payment gateway (simulated).
    pub payment: Arc<dyn PaymentGateway>,
    /// Order store: idempotent order/line persistence.
    pub orders: Arc<dyn OrderStore>,
    /// User directory: email lookup for the confirmation message.
    pub users: Arc<dyn UserDirectory>,
    /// Notification service: best-effort confirmation delivery.
    pub notifier: Arc<dyn Notifier>,
}

/// Orchestrates the checkout pipeline for submitted sessions.
///
/// The pipeline is an ordered sequence of steps, each idempotent or
/// compensated, recorded step-by-step on an event-sourced
/// [`CheckoutSaga`] record. Idempotency keys (reservation id, order id,
/// line-item ids) are derived from the session id, so re-executing the
/// whole pipeline after a crash reuses the same keys: completed steps
/// are skipped via the record, and replayed calls hit the collaborators'
/// idempotent paths.
pub struct CheckoutCoordinator<S, L>
where
    S: EventStore,
    L: LedgerStore,
{
    store: S,
    carts: CartService<S>,
    ledger: Arc<ReservationLedger<L>>,
    services: Collaborators,
    shipping: ShippingSubSaga,
    recommendations: RecommendationTrigger,
    retry: RetryPolicy,
}

impl<S, L> CheckoutCoordinator<S, L>
where
    S: EventStore + Clone,
    L: LedgerStore,
{
    /// Creates a new checkout coordinator.
    pub fn new(
        store: S,
        ledger: Arc<ReservationLedger<L>>,
        services: Collaborators,
        shipping: ShippingSubSaga,
        recommendations: RecommendationTrigger,
        retry: RetryPolicy,
    ) -> Self {
        let carts = CartService::new(store.clone());
        Self {
            store,
            carts,
            ledger,
            services,
            shipping,
            recommendations,
            retry,
        }
    }

    /// Executes the checkout pipeline for a submitted session.
    ///
    /// Safe to call again after a crash or for an already-finished
    /// session: completed steps are skipped and a terminal saga returns
    /// immediately. Returns the saga record id; the outcome is read from
    /// the record.
    #[tracing::instrument(skip(self), fields(saga_type = steps::SAGA_TYPE))]
    pub async fn execute(&self, session_id: &SessionId) -> Result<AggregateId, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let cart = self
            .carts
            .get_session(session_id)
            .await?
            .ok_or_else(|| SagaError::SessionNotFound(session_id.clone()))?;

        let saga_id = session_id.checkout_id();
        let mut saga = self.load_saga(saga_id).await?;

        // A terminal record means the pipeline already ran to its end;
        // at most the cart transition still needs to be caught up.
        if saga.state().is_terminal() {
            self.settle_cart(session_id, &saga).await;
            return Ok(saga_id);
        }

        if !matches!(cart.state(), CartState::Submitted | CartState::Processing) {
            return Err(SagaError::SessionNotReady(format!(
                "session is {}, expected Submitted",
                cart.state()
            )));
        }
        if !cart.has_items() {
            return Err(SagaError::SessionNotReady("cart is empty".to_string()));
        }
        let user_id = cart
            .user_id()
            .cloned()
            .ok_or_else(|| SagaError::SessionNotReady("no user attached".to_string()))?;
        let checkout_info = cart
            .info()
            .checkout
            .clone()
            .ok_or_else(|| SagaError::SessionNotReady("no checkout data staged".to_string()))?;
        let lines: Vec<(ProductId, u32)> = cart
            .items()
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();

        let mut version = saga.version();
        if saga.state() == CheckoutState::NotStarted {
            let started =
                CheckoutEvent::saga_started(saga_id, session_id.clone(), steps::SAGA_TYPE);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);
        }

        self.carts.begin_pipeline(session_id).await?;

        // Idempotency keys, derived from the session id so that a
        // crash-and-replay regenerates the same keys.
        let reservation_id = AggregateId::derived(&format!("reservation:{session_id}"));
        let order_id = AggregateId::derived(&format!("order:{session_id}"));
        let workflow_id = session_id.shipping_workflow_id();

        // 1. Check + reserve stock
        if !saga.has_completed(steps::STEP_RESERVE_STOCK) {
            tracing::info!(step = steps::STEP_RESERVE_STOCK, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_RESERVE_STOCK);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            let result = {
                let ledger = self.ledger.clone();
                let lines = lines.clone();
                run_with_retries(&self.retry, steps::STEP_RESERVE_STOCK, move || {
                    let ledger = ledger.clone();
                    let lines = lines.clone();
                    async move {
                        match ledger.reserve(reservation_id, lines).await {
                            Ok(ReserveOutcome::Reserved) => Ok(()),
                            Ok(ReserveOutcome::InsufficientStock {
                                product_id,
                                available,
                            }) => Err(StepError::InsufficientStock {
                                product_id,
                                available,
                            }),
                            Err(e) => Err(StepError::Transient(e.to_string())),
                        }
                    }
                })
                .await
            };

            match result {
                Ok(()) => {
                    let completed = CheckoutEvent::step_completed_with_reservation(
                        steps::STEP_RESERVE_STOCK,
                        reservation_id,
                    );
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                }
                Err(error) => {
                    self.abort(
                        &mut saga,
                        saga_id,
                        &mut version,
                        session_id,
                        steps::STEP_RESERVE_STOCK,
                        error,
                    )
                    .await?;
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Ok(saga_id);
                }
            }
        }

        // 2. Price the cart from current catalog prices
        if !saga.has_completed(steps::STEP_PRICE_ORDER) {
            tracing::info!(step = steps::STEP_PRICE_ORDER, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_PRICE_ORDER);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            let result = {
                let catalog = self.services.catalog.clone();
                let lines = lines.clone();
                run_with_retries(&self.retry, steps::STEP_PRICE_ORDER, move || {
                    let catalog = catalog.clone();
                    let lines = lines.clone();
                    async move {
                        let product_ids: Vec<ProductId> =
                            lines.iter().map(|(product_id, _)| product_id.clone()).collect();
                        let prices = catalog.unit_prices(&product_ids).await?;
                        let mut total = Money::zero();
                        for (product_id, quantity) in &lines {
                            let unit = prices.get(product_id).copied().ok_or_else(|| {
                                StepError::Validation(format!("price missing for {product_id}"))
                            })?;
                            total += unit.multiply(*quantity);
                        }
                        Ok(total)
                    }
                })
                .await
            };

            match result {
                Ok(total) => {
                    let completed =
                        CheckoutEvent::step_completed_with_total(steps::STEP_PRICE_ORDER, total);
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                    self.carts.set_total_price(session_id, total).await?;
                }
                Err(error) => {
                    self.abort(
                        &mut saga,
                        saga_id,
                        &mut version,
                        session_id,
                        steps::STEP_PRICE_ORDER,
                        error,
                    )
                    .await?;
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Ok(saga_id);
                }
            }
        }
        let total_price = saga
            .total_price()
            .ok_or(SagaError::MissingStepResult("total_price"))?;

        // 3. Charge the payment instrument
        if !saga.has_completed(steps::STEP_CHARGE_PAYMENT) {
            tracing::info!(step = steps::STEP_CHARGE_PAYMENT, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_CHARGE_PAYMENT);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            let result = {
                let payment = self.services.payment.clone();
                let user_id = user_id.clone();
                run_with_retries(&self.retry, steps::STEP_CHARGE_PAYMENT, move || {
                    let payment = payment.clone();
                    let user_id = user_id.clone();
                    async move { payment.charge(&user_id, total_price).await }
                })
                .await
            };

            match result {
                Ok(()) => {
                    let completed = CheckoutEvent::step_completed(steps::STEP_CHARGE_PAYMENT);
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                }
                Err(error) => {
                    self.abort(
                        &mut saga,
                        saga_id,
                        &mut version,
                        session_id,
                        steps::STEP_CHARGE_PAYMENT,
                        error,
                    )
                    .await?;
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Ok(saga_id);
                }
            }
        }

        // 4. Persist the order record
        if !saga.has_completed(steps::STEP_STORE_ORDER) {
            tracing::info!(step = steps::STEP_STORE_ORDER, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_STORE_ORDER);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            let record = OrderRecord {
                order_id,
                user_id: user_id.clone(),
                total_price,
                checkout: checkout_info.clone(),
                shipping_workflow_id: workflow_id.clone(),
                shipping_done: false,
            };
            let result = {
                let orders = self.services.orders.clone();
                run_with_retries(&self.retry, steps::STEP_STORE_ORDER, move || {
                    let orders = orders.clone();
                    let record = record.clone();
                    // A duplicate order id is a success, not a conflict.
                    async move { orders.create_order(record).await.map(|_| ()) }
                })
                .await
            };

            match result {
                Ok(()) => {
                    let completed =
                        CheckoutEvent::step_completed_with_order(steps::STEP_STORE_ORDER, order_id);
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                    self.carts.record_order(session_id, order_id).await?;
                }
                Err(error) => {
                    self.abort(
                        &mut saga,
                        saga_id,
                        &mut version,
                        session_id,
                        steps::STEP_STORE_ORDER,
                        error,
                    )
                    .await?;
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Ok(saga_id);
                }
            }
        }

        // 5. Persist order line items (idempotent per line)
        if !saga.has_completed(steps::STEP_STORE_LINE_ITEMS) {
            tracing::info!(step = steps::STEP_STORE_LINE_ITEMS, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_STORE_LINE_ITEMS);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            let result = {
                let orders = self.services.orders.clone();
                let lines = lines.clone();
                let session = session_id.clone();
                run_with_retries(&self.retry, steps::STEP_STORE_LINE_ITEMS, move || {
                    let orders = orders.clone();
                    let lines = lines.clone();
                    let session = session.clone();
                    async move {
                        for (product_id, quantity) in &lines {
                            let line_id = AggregateId::derived(&format!(
                                "order-item:{session}:{product_id}"
                            ));
                            orders
                                .append_line_item(OrderLine {
                                    line_id,
                                    order_id,
                                    product_id: product_id.clone(),
                                    quantity: *quantity,
                                })
                                .await?;
                        }
                        Ok(())
                    }
                })
                .await
            };

            match result {
                Ok(()) => {
                    let completed = CheckoutEvent::step_completed(steps::STEP_STORE_LINE_ITEMS);
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                }
                Err(error) => {
                    self.abort(
                        &mut saga,
                        saga_id,
                        &mut version,
                        session_id,
                        steps::STEP_STORE_LINE_ITEMS,
                        error,
                    )
                    .await?;
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Ok(saga_id);
                }
            }
        }

        // 6. Wake the recommendation refresh job (fire-and-forget)
        self.recommendations.trigger();

        // 7. Send the confirmation email (best-effort; never rolls back)
        if !saga.has_completed(steps::STEP_NOTIFY_CUSTOMER) {
            tracing::info!(step = steps::STEP_NOTIFY_CUSTOMER, "saga step started");
            let result = {
                let users = self.services.users.clone();
                let notifier = self.services.notifier.clone();
                let user_id = user_id.clone();
                let recipient = checkout_info.recipient.clone();
                run_with_retries(&self.retry, steps::STEP_NOTIFY_CUSTOMER, move || {
                    let users = users.clone();
                    let notifier = notifier.clone();
                    let user_id = user_id.clone();
                    let recipient = recipient.clone();
                    async move {
                        let user = users
                            .find_by_id(&user_id)
                            .await?
                            .ok_or_else(|| {
                                StepError::Validation(format!("unknown user: {user_id}"))
                            })?;
                        notifier
                            .deliver(Message {
                                address: user.email,
                                subject: "Thank you for your order!".to_string(),
                                body: format!(
                                    "Hi {recipient}, thank you for your order #{order_id}."
                                ),
                            })
                            .await
                    }
                })
                .await
            };

            match result {
                Ok(()) => {
                    let completed = CheckoutEvent::step_completed(steps::STEP_NOTIFY_CUSTOMER);
                    version = self.append_saga_event(saga_id, version, &completed).await?;
                    saga.apply(completed);
                }
                Err(error) => {
                    // The order stands; the customer just misses the email.
                    metrics::counter!("confirmation_emails_failed").increment(1);
                    tracing::warn!(%session_id, %error, "confirmation email failed, order unaffected");
                }
            }
        }

        // 8. Spawn the shipping sub-saga as a child
        if !saga.has_completed(steps::STEP_DISPATCH_SHIPPING) {
            tracing::info!(step = steps::STEP_DISPATCH_SHIPPING, "saga step started");
            let started = CheckoutEvent::step_started(steps::STEP_DISPATCH_SHIPPING);
            version = self.append_saga_event(saga_id, version, &started).await?;
            saga.apply(started);

            self.shipping.dispatch(workflow_id.clone(), order_id);

            let completed = CheckoutEvent::step_completed_with_shipping(
                steps::STEP_DISPATCH_SHIPPING,
                workflow_id.clone(),
            );
            version = self.append_saga_event(saga_id, version, &completed).await?;
            saga.apply(completed);
        } else if self.shipping.tracker().status(&workflow_id).is_none() {
            // The step was recorded by a previous process; its child task
            // died with it. Re-dispatch — the completion report is idempotent.
            self.shipping.dispatch(workflow_id.clone(), order_id);
        }

        // 9. Done
        let completed_event = CheckoutEvent::saga_completed();
        self.append_saga_event(saga_id, version, &completed_event)
            .await?;
        self.carts.complete_checkout(session_id).await?;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(%saga_id, %session_id, duration, "checkout saga completed");

        Ok(saga_id)
    }

    /// Re-drives the pipeline for a session interrupted mid-checkout.
    ///
    /// Returns the saga id if a pipeline was (re)run, None if the session
    /// does not exist or has nothing to resume.
    pub async fn resume(&self, session_id: &SessionId) -> Result<Option<AggregateId>, SagaError> {
        let Some(cart) = self.carts.get_session(session_id).await? else {
            return Ok(None);
        };
        match cart.state() {
            CartState::Submitted | CartState::Processing => {
                tracing::info!(%session_id, "resuming interrupted checkout");
                self.execute(session_id).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Loads a saga record by ID from the event store.
    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<Option<CheckoutSaga>, SagaError> {
        let saga = self.load_saga(saga_id).await?;
        if saga.id().is_some() {
            Ok(Some(saga))
        } else {
            Ok(None)
        }
    }

    /// Fails the current step, compensates completed steps in reverse
    /// order, and fails the saga and the session.
    async fn abort(
        &self,
        saga: &mut CheckoutSaga,
        saga_id: AggregateId,
        version: &mut Version,
        session_id: &SessionId,
        step: &'static str,
        error: StepError,
    ) -> Result<(), SagaError> {
        let failed = CheckoutEvent::step_failed(step, error.to_string());
        *version = self.append_saga_event(saga_id, *version, &failed).await?;
        saga.apply(failed);

        // Nothing to unwind when the very first step rejected the batch.
        if !saga.completed_steps().is_empty() {
            self.compensate(saga, saga_id, version, step).await?;
        }

        let failed_event = CheckoutEvent::saga_failed(error.to_string());
        *version = self
            .append_saga_event(saga_id, *version, &failed_event)
            .await?;
        saga.apply(failed_event);

        self.carts
            .fail_checkout(session_id, &error.to_string())
            .await?;

        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(%saga_id, %session_id, step, %error, "checkout saga failed");
        Ok(())
    }

    /// Runs compensating actions in reverse order of completed steps.
    ///
    /// Only the stock reservation has a compensating action; a failure
    /// there is recorded as an operational alert and never masks the
    /// original step failure.
    #[tracing::instrument(skip(self, saga, version))]
    async fn compensate(
        &self,
        saga: &mut CheckoutSaga,
        saga_id: AggregateId,
        version: &mut Version,
        from_step: &str,
    ) -> Result<(), SagaError> {
        let comp_started = CheckoutEvent::compensation_started(from_step);
        *version = self
            .append_saga_event(saga_id, *version, &comp_started)
            .await?;
        saga.apply(comp_started);

        let completed: Vec<String> = saga.completed_steps().to_vec();
        for step in completed.iter().rev() {
            match step.as_str() {
                steps::STEP_RESERVE_STOCK => {
                    if let Some(reservation_id) = saga.reservation_id() {
                        let result = run_with_retries(&self.retry, "release_stock", || {
                            let ledger = self.ledger.clone();
                            async move {
                                ledger
                                    .release(reservation_id)
                                    .await
                                    .map_err(|e| StepError::Transient(e.to_string()))
                            }
                        })
                        .await;

                        match result {
                            Ok(()) => {
                                let event = CheckoutEvent::compensation_step_completed(step);
                                *version =
                                    self.append_saga_event(saga_id, *version, &event).await?;
                                saga.apply(event);
                            }
                            Err(error) => {
                                metrics::counter!("saga_compensation_failures").increment(1);
                                tracing::error!(%saga_id, %reservation_id, %error, "stock release failed, reservation left active");
                                let event = CheckoutEvent::compensation_step_failed(
                                    step,
                                    error.to_string(),
                                );
                                *version =
                                    self.append_saga_event(saga_id, *version, &event).await?;
                                saga.apply(event);
                            }
                        }
                    }
                }
                // Pricing, payment (simulated, no refund channel), and the
                // idempotent store writes have no compensating action.
                _ => {}
            }
        }

        Ok(())
    }

    /// Catches the cart up with an already-terminal saga record.
    async fn settle_cart(&self, session_id: &SessionId, saga: &CheckoutSaga) {
        let result = match saga.state() {
            CheckoutState::Completed => self.carts.complete_checkout(session_id).await,
            CheckoutState::Failed => {
                let reason = saga.failure_reason().unwrap_or("checkout failed").to_string();
                self.carts.fail_checkout(session_id, &reason).await
            }
            _ => return,
        };
        if let Err(error) = result {
            tracing::debug!(%session_id, %error, "cart already settled");
        }
    }

    /// Rebuilds the saga record by replaying its events.
    async fn load_saga(&self, saga_id: AggregateId) -> Result<CheckoutSaga, SagaError> {
        let events = self.store.get_events_for_aggregate(saga_id).await?;

        let mut saga = CheckoutSaga::default();
        for envelope in events {
            let event: CheckoutEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(saga)
    }

    /// Appends a single saga event to the event store.
    async fn append_saga_event(
        &self,
        saga_id: AggregateId,
        current_version: Version,
        event: &CheckoutEvent,
    ) -> Result<Version, SagaError> {
        let next_version = current_version.next();

        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(saga_id)
            .aggregate_type(CheckoutSaga::aggregate_type())
            .version(next_version)
            .payload(event)?
            .build();

        let new_version = self
            .store
            .append(
                vec![envelope],
                AppendOptions::expect_version(current_version),
            )
            .await?;

        Ok(new_version)
    }
}
