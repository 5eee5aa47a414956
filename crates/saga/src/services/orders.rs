//! Order store adapter: idempotent order and line-item persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::{CheckoutInfo, Money, ProductId, UserId};

use crate::retry::StepError;

/// The order record persisted by the pipeline.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    /// The order id (idempotency key).
    pub order_id: AggregateId,
    /// The purchasing user.
    pub user_id: UserId,
    /// Total price charged.
    pub total_price: Money,
    /// Address and payment fields at submission time.
    pub checkout: CheckoutInfo,
    /// The shipping sub-saga tracking this order.
    pub shipping_workflow_id: String,
    /// Whether the shipping sub-saga reported completion.
    pub shipping_done: bool,
}

/// One line item of an order.
#[derive(Debug, Clone)]
pub struct OrderLine {
    /// The line id (idempotency key).
    pub line_id: AggregateId,
    /// The owning order.
    pub order_id: AggregateId,
    /// The purchased product.
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: u32,
}

/// Outcome of an idempotent create/append: a duplicate id is reported
/// as a non-error success, never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written.
    Created,
    /// A record with this id already existed; nothing was written.
    AlreadyExists,
}

/// Trait for the order store service.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates an order. Idempotent on the order id.
    async fn create_order(&self, record: OrderRecord) -> Result<AppendOutcome, StepError>;

    /// Appends one line item. Idempotent on the line id.
    async fn append_line_item(&self, line: OrderLine) -> Result<AppendOutcome, StepError>;

    /// Marks the order's shipping flag true. Setting it twice is harmless.
    async fn mark_shipping_done(&self, order_id: AggregateId) -> Result<(), StepError>;

    /// Returns an order by id.
    async fn get_order(&self, order_id: AggregateId) -> Result<Option<OrderRecord>, StepError>;

    /// Lists every line item ever stored (the recommendation job's read).
    async fn list_line_items(&self) -> Result<Vec<OrderLine>, StepError>;

    /// Lists orders for a user.
    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<OrderRecord>, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderStoreState {
    orders: HashMap<AggregateId, OrderRecord>,
    lines: HashMap<AggregateId, OrderLine>,
    fail_on_create: bool,
}

/// In-memory order store for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderStoreState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail creates with a transient error.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Returns the number of stored orders.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns the number of stored line items.
    pub fn line_count(&self) -> usize {
        self.state.read().unwrap().lines.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, record: OrderRecord) -> Result<AppendOutcome, StepError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(StepError::Transient("order store unavailable".to_string()));
        }

        if state.orders.contains_key(&record.order_id) {
            return Ok(AppendOutcome::AlreadyExists);
        }

        state.orders.insert(record.order_id, record);
        Ok(AppendOutcome::Created)
    }

    async fn append_line_item(&self, line: OrderLine) -> Result<AppendOutcome, StepError> {
        let mut state = self.state.write().unwrap();

        if state.lines.contains_key(&line.line_id) {
            return Ok(AppendOutcome::AlreadyExists);
        }

        state.lines.insert(line.line_id, line);
        Ok(AppendOutcome::Created)
    }

    async fn mark_shipping_done(&self, order_id: AggregateId) -> Result<(), StepError> {
        let mut state = self.state.write().unwrap();
        match state.orders.get_mut(&order_id) {
            Some(order) => {
                order.shipping_done = true;
                Ok(())
            }
            None => Err(StepError::Validation(format!(
                "unknown order: {order_id}"
            ))),
        }
    }

    async fn get_order(&self, order_id: AggregateId) -> Result<Option<OrderRecord>, StepError> {
        Ok(self.state.read().unwrap().orders.get(&order_id).cloned())
    }

    async fn list_line_items(&self) -> Result<Vec<OrderLine>, StepError> {
        Ok(self.state.read().unwrap().lines.values().cloned().collect())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<OrderRecord>, StepError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .orders
            .values()
            .filter(|order| &order.user_id == user_id)
            .cloned()
            .collect())
    }
}
