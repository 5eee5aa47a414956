//! Cart session domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, SessionId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CartItem, CheckoutInfo, Money, ProductId, UserId};

/// Events that can occur on a cart session aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// A session appeared and its cart was created.
    SessionOpened(SessionOpenedData),

    /// An item was added to the cart (or its quantity bumped by one).
    ItemAdded(ItemAddedData),

    /// A cart line was removed entirely.
    ItemRemoved(ItemRemovedData),

    /// Quantities of existing cart lines were replaced.
    ItemsRevised(ItemsRevisedData),

    /// A user was attached to the session.
    UserAssigned(UserAssignedData),

    /// Address and payment fields were staged by the checkout form.
    CheckoutStaged(CheckoutStagedData),

    /// Both staged checkout data and a user are present; the cart froze.
    CheckoutSubmitted(CheckoutSubmittedData),

    /// The checkout pipeline started executing.
    PipelineStarted(PipelineStartedData),

    /// The pipeline priced the cart.
    OrderPriced(OrderPricedData),

    /// The pipeline persisted the order record.
    OrderRecorded(OrderRecordedData),

    /// The purchase went through.
    CheckoutCompleted(CheckoutCompletedData),

    /// The purchase failed on a non-retryable error.
    CheckoutFailed(CheckoutFailedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::SessionOpened(_) => "SessionOpened",
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::ItemRemoved(_) => "ItemRemoved",
            CartEvent::ItemsRevised(_) => "ItemsRevised",
            CartEvent::UserAssigned(_) => "UserAssigned",
            CartEvent::CheckoutStaged(_) => "CheckoutStaged",
            CartEvent::CheckoutSubmitted(_) => "CheckoutSubmitted",
            CartEvent::PipelineStarted(_) => "PipelineStarted",
            CartEvent::OrderPriced(_) => "OrderPriced",
            CartEvent::OrderRecorded(_) => "OrderRecorded",
            CartEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CartEvent::CheckoutFailed(_) => "CheckoutFailed",
        }
    }
}

/// Data for SessionOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOpenedData {
    /// The cart aggregate id (derived from the session id).
    pub cart_id: AggregateId,

    /// The owning browser session.
    pub session_id: SessionId,

    /// The signed-in user, if the session already had one.
    pub user_id: Option<UserId>,

    /// When the session was opened.
    pub opened_at: DateTime<Utc>,
}

/// Data for ItemAdded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAddedData {
    /// The product that was added.
    pub product_id: ProductId,
}

/// Data for ItemRemoved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRemovedData {
    /// The product whose line was removed.
    pub product_id: ProductId,
}

/// Data for ItemsRevised event.
///
/// Carries only lines whose product already existed in the cart at the
/// time the signal was applied; unknown products are dropped before the
/// event is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsRevisedData {
    /// New quantities per existing line. A quantity of zero removes the line.
    pub items: Vec<CartItem>,
}

/// Data for UserAssigned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAssignedData {
    /// The user attached to the session.
    pub user_id: UserId,
}

/// Data for CheckoutStaged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStagedData {
    /// The staged address/payment fields.
    pub info: CheckoutInfo,
}

/// Data for CheckoutSubmitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSubmittedData {
    /// When the submission guard fired.
    pub submitted_at: DateTime<Utc>,
}

/// Data for PipelineStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStartedData {
    /// When the pipeline started.
    pub started_at: DateTime<Utc>,
}

/// Data for OrderPriced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPricedData {
    /// Total price of the cart at current catalog prices.
    pub total_price: Money,
}

/// Data for OrderRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecordedData {
    /// The order id assigned by the pipeline.
    pub order_id: AggregateId,
}

/// Data for CheckoutCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    /// When the purchase completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for CheckoutFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    /// Why the purchase failed.
    pub reason: String,

    /// When the purchase failed.
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl CartEvent {
    /// Creates a SessionOpened event.
    pub fn session_opened(
        cart_id: AggregateId,
        session_id: SessionId,
        user_id: Option<UserId>,
    ) -> Self {
        CartEvent::SessionOpened(SessionOpenedData {
            cart_id,
            session_id,
            user_id,
            opened_at: Utc::now(),
        })
    }

    /// Creates an ItemAdded event.
    pub fn item_added(product_id: impl Into<ProductId>) -> Self {
        CartEvent::ItemAdded(ItemAddedData {
            product_id: product_id.into(),
        })
    }

    /// Creates an ItemRemoved event.
    pub fn item_removed(product_id: impl Into<ProductId>) -> Self {
        CartEvent::ItemRemoved(ItemRemovedData {
            product_id: product_id.into(),
        })
    }

    /// Creates an ItemsRevised event.
    pub fn items_revised(items: Vec<CartItem>) -> Self {
        CartEvent::ItemsRevised(ItemsRevisedData { items })
    }

    /// Creates a UserAssigned event.
    pub fn user_assigned(user_id: impl Into<UserId>) -> Self {
        CartEvent::UserAssigned(UserAssignedData {
            user_id: user_id.into(),
        })
    }

    /// Creates a CheckoutStaged event.
    pub fn checkout_staged(info: CheckoutInfo) -> Self {
        CartEvent::CheckoutStaged(CheckoutStagedData { info })
    }

    /// Creates a CheckoutSubmitted event.
    pub fn checkout_submitted() -> Self {
        CartEvent::CheckoutSubmitted(CheckoutSubmittedData {
            submitted_at: Utc::now(),
        })
    }

    /// Creates a PipelineStarted event.
    pub fn pipeline_started() -> Self {
        CartEvent::PipelineStarted(PipelineStartedData {
            started_at: Utc::now(),
        })
    }

    /// Creates an OrderPriced event.
    pub fn order_priced(total_price: Money) -> Self {
        CartEvent::OrderPriced(OrderPricedData { total_price })
    }

    /// Creates an OrderRecorded event.
    pub fn order_recorded(order_id: AggregateId) -> Self {
        CartEvent::OrderRecorded(OrderRecordedData { order_id })
    }

    /// Creates a CheckoutCompleted event.
    pub fn checkout_completed() -> Self {
        CartEvent::CheckoutCompleted(CheckoutCompletedData {
            completed_at: Utc::now(),
        })
    }

    /// Creates a CheckoutFailed event.
    pub fn checkout_failed(reason: impl Into<String>) -> Self {
        CartEvent::CheckoutFailed(CheckoutFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
