//! Checkout saga record aggregate.

use common::{AggregateId, SessionId};
use domain::{Aggregate, Money};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// The event-sourced record of one checkout pipeline execution.
///
/// Tracks completed steps and the results they produced (reservation id,
/// total price, order id, shipping workflow id). After a crash the
/// coordinator reloads this record and skips every step that already
/// completed, reusing the recorded results — this is the durable
/// checkpoint that makes full pipeline replay correct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    id: Option<AggregateId>,
    version: Version,
    saga_type: String,
    session_id: Option<SessionId>,
    state: CheckoutState,
    completed_steps: Vec<String>,
    /// Reservation id recorded by the reserve_stock step.
    reservation_id: Option<AggregateId>,
    /// Total price recorded by the price_order step.
    total_price: Option<Money>,
    /// Order id recorded by the store_order step.
    order_id: Option<AggregateId>,
    /// Shipping workflow id recorded by the dispatch_shipping step.
    shipping_workflow_id: Option<String>,
    /// Reason for failure, if any.
    failure_reason: Option<String>,
    /// Compensating actions that could not be executed. Surfaced as
    /// operational alerts, never rethrown to the customer-facing flow.
    compensation_failures: Vec<String>,
}

impl Aggregate for CheckoutSaga {
    type Event = CheckoutEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "CheckoutSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CheckoutEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.session_id = Some(data.session_id);
                self.saga_type = data.saga_type;
                self.state = CheckoutState::Running;
            }
            CheckoutEvent::StepStarted(_) => {}
            CheckoutEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name);
                if let Some(rid) = data.reservation_id {
                    self.reservation_id = Some(rid);
                }
                if let Some(total) = data.total_price {
                    self.total_price = Some(total);
                }
                if let Some(oid) = data.order_id {
                    self.order_id = Some(oid);
                }
                if let Some(wid) = data.shipping_workflow_id {
                    self.shipping_workflow_id = Some(wid);
                }
            }
            CheckoutEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            CheckoutEvent::CompensationStarted(_) => {
                self.state = CheckoutState::Compensating;
            }
            CheckoutEvent::CompensationStepCompleted(_) => {}
            CheckoutEvent::CompensationStepFailed(data) => {
                // Recorded, but compensation failures don't stop the chain.
                self.compensation_failures
                    .push(format!("{}: {}", data.step_name, data.error));
            }
            CheckoutEvent::SagaCompleted(_) => {
                self.state = CheckoutState::Completed;
            }
            CheckoutEvent::SagaFailed(data) => {
                self.state = CheckoutState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    /// Returns the saga state.
    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Returns the session this saga is checking out.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Returns the saga type.
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    /// Returns the list of completed step names.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns true if the given step already completed.
    pub fn has_completed(&self, step_name: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step_name)
    }

    /// Returns the recorded reservation id, if set.
    pub fn reservation_id(&self) -> Option<AggregateId> {
        self.reservation_id
    }

    /// Returns the recorded total price, if set.
    pub fn total_price(&self) -> Option<Money> {
        self.total_price
    }

    /// Returns the recorded order id, if set.
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    /// Returns the recorded shipping workflow id, if set.
    pub fn shipping_workflow_id(&self) -> Option<&str> {
        self.shipping_workflow_id.as_deref()
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the recorded compensation failures (operational alerts).
    pub fn compensation_failures(&self) -> &[String] {
        &self.compensation_failures
    }
}
