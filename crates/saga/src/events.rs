//! Checkout saga events.
//!
//! The saga record is itself event-sourced: each step's outcome is
//! appended before the pipeline moves on, so a crash-and-replay can skip
//! completed steps and reuse their recorded results.

use chrono::{DateTime, Utc};
use common::{AggregateId, SessionId};
use domain::{DomainEvent, Money};
use serde::{Deserialize, Serialize};

/// Events that can occur during checkout saga execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A pipeline step started execution.
    StepStarted(StepData),

    /// A pipeline step completed successfully.
    StepCompleted(StepCompletedData),

    /// A pipeline step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensating action completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensating action failed (logged, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Saga completed successfully.
    SagaCompleted(SagaCompletedData),

    /// Saga failed after compensation.
    SagaFailed(SagaFailedData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::SagaStarted(_) => "SagaStarted",
            CheckoutEvent::StepStarted(_) => "StepStarted",
            CheckoutEvent::StepCompleted(_) => "StepCompleted",
            CheckoutEvent::StepFailed(_) => "StepFailed",
            CheckoutEvent::CompensationStarted(_) => "CompensationStarted",
            CheckoutEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            CheckoutEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            CheckoutEvent::SagaCompleted(_) => "SagaCompleted",
            CheckoutEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    /// The saga record ID (derived from the session id).
    pub saga_id: AggregateId,
    /// The session being checked out.
    pub session_id: SessionId,
    /// The type of saga (e.g., "Checkout").
    pub saga_type: String,
    /// When the saga started.
    pub started_at: DateTime<Utc>,
}

/// Data for step started/compensation completed events (just the step name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    /// The step name.
    pub step_name: String,
}

/// Data for StepCompleted event.
///
/// Carries whatever the step produced, so replay can reuse the result
/// instead of re-deriving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    /// The step name.
    pub step_name: String,
    /// Reservation ID (set after the reserve_stock step).
    pub reservation_id: Option<AggregateId>,
    /// Total price (set after the price_order step).
    pub total_price: Option<Money>,
    /// Order ID (set after the store_order step).
    pub order_id: Option<AggregateId>,
    /// Shipping workflow ID (set after the dispatch_shipping step).
    pub shipping_workflow_id: Option<String>,
}

/// Data for StepFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step_name: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    /// When the saga completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    /// Reason for failure.
    pub reason: String,
    /// When the saga failed.
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(
        saga_id: AggregateId,
        session_id: SessionId,
        saga_type: impl Into<String>,
    ) -> Self {
        CheckoutEvent::SagaStarted(SagaStartedData {
            saga_id,
            session_id,
            saga_type: saga_type.into(),
            started_at: Utc::now(),
        })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        CheckoutEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a StepCompleted event with no recorded result.
    pub fn step_completed(step_name: impl Into<String>) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            reservation_id: None,
            total_price: None,
            order_id: None,
            shipping_workflow_id: None,
        })
    }

    /// Creates a StepCompleted event recording a reservation id.
    pub fn step_completed_with_reservation(
        step_name: impl Into<String>,
        reservation_id: AggregateId,
    ) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            reservation_id: Some(reservation_id),
            total_price: None,
            order_id: None,
            shipping_workflow_id: None,
        })
    }

    /// Creates a StepCompleted event recording a total price.
    pub fn step_completed_with_total(step_name: impl Into<String>, total_price: Money) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            reservation_id: None,
            total_price: Some(total_price),
            order_id: None,
            shipping_workflow_id: None,
        })
    }

    /// Creates a StepCompleted event recording an order id.
    pub fn step_completed_with_order(step_name: impl Into<String>, order_id: AggregateId) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            reservation_id: None,
            total_price: None,
            order_id: Some(order_id),
            shipping_workflow_id: None,
        })
    }

    /// Creates a StepCompleted event recording a shipping workflow id.
    pub fn step_completed_with_shipping(
        step_name: impl Into<String>,
        shipping_workflow_id: impl Into<String>,
    ) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            reservation_id: None,
            total_price: None,
            order_id: None,
            shipping_workflow_id: Some(shipping_workflow_id.into()),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        CheckoutEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        CheckoutEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a SagaCompleted event.
    pub fn saga_completed() -> Self {
        CheckoutEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    /// Creates a SagaFailed event.
    pub fn saga_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
