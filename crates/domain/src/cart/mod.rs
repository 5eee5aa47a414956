//! Cart session aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::CartSession;
pub use commands::*;
pub use events::{
    CartEvent, CheckoutCompletedData, CheckoutFailedData, CheckoutStagedData,
    CheckoutSubmittedData, ItemAddedData, ItemRemovedData, ItemsRevisedData, OrderPricedData,
    OrderRecordedData, PipelineStartedData, SessionOpenedData, UserAssignedData,
};
pub use service::CartService;
pub use state::CartState;
pub use value_objects::{CartItem, CheckoutInfo, Money, OrderInfo, ProductId, UserId};

use thiserror::Error;

/// Errors that can occur during cart session operations.
///
/// Mutation signals never produce errors — a frozen cart swallows them.
/// Errors come from lifecycle misuse (opening twice, pipeline transitions
/// from the wrong state).
#[derive(Debug, Error)]
pub enum CartError {
    /// Session is not in the expected state for a pipeline transition.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: CartState,
        action: &'static str,
    },

    /// Session was already opened.
    #[error("Session already opened")]
    AlreadyOpened,
}
