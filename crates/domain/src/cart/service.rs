//! Cart service providing a simplified API for cart session operations.

use common::{AggregateId, SessionId};
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    AddItem, AssignUser, CartSession, Money, OpenSession, RemoveItem, ReviseCart, StageCheckout,
};

impl From<super::CartError> for DomainError {
    fn from(e: super::CartError) -> Self {
        DomainError::Cart(e)
    }
}

/// Service for managing cart sessions.
///
/// Provides a high-level API over the command handler. Mutation signals
/// go through here one at a time; reads load the aggregate as a snapshot
/// view. Cart mutations take snapshots periodically so long-lived
/// sessions replay from a checkpoint instead of from scratch.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, CartSession>,
}

impl<S: EventStore> CartService<S> {
    /// Creates a new cart service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, CartSession> {
        &self.handler
    }

    /// Opens a cart for a session.
    #[tracing::instrument(skip(self))]
    pub async fn open_session(
        &self,
        cmd: OpenSession,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        let cart_id = cmd.session_id.cart_id();
        let session_id = cmd.session_id.clone();
        let user_id = cmd.user_id.clone();

        self.handler
            .execute(cart_id, |session| {
                session.open(cart_id, session_id, user_id)
            })
            .await
    }

    /// Adds one unit of a product to the cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cmd: AddItem) -> Result<CommandResult<CartSession>, DomainError> {
        let product_id = cmd.product_id.clone();

        self.handler
            .execute_with_snapshot(cmd.session_id.cart_id(), |session| {
                session.add_item(product_id)
            })
            .await
    }

    /// Removes a product's line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cmd: RemoveItem,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        let product_id = cmd.product_id.clone();

        self.handler
            .execute_with_snapshot(cmd.session_id.cart_id(), |session| {
                session.remove_item(product_id)
            })
            .await
    }

    /// Replaces quantities of existing cart lines.
    #[tracing::instrument(skip(self))]
    pub async fn revise_cart(
        &self,
        cmd: ReviseCart,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        let items = cmd.items.clone();

        self.handler
            .execute_with_snapshot(cmd.session_id.cart_id(), |session| {
                session.revise_items(items)
            })
            .await
    }

    /// Attaches a user to the session.
    #[tracing::instrument(skip(self))]
    pub async fn assign_user(
        &self,
        cmd: AssignUser,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        let user_id = cmd.user_id.clone();

        self.handler
            .execute_with_snapshot(cmd.session_id.cart_id(), |session| {
                session.assign_user(user_id)
            })
            .await
    }

    /// Stages checkout form data.
    #[tracing::instrument(skip(self))]
    pub async fn stage_checkout(
        &self,
        cmd: StageCheckout,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        let info = cmd.info.clone();

        self.handler
            .execute_with_snapshot(cmd.session_id.cart_id(), |session| {
                session.stage_checkout(info)
            })
            .await
    }

    // Pipeline-driven transitions, called by the checkout coordinator.

    /// Marks the pipeline as running.
    #[tracing::instrument(skip(self))]
    pub async fn begin_pipeline(
        &self,
        session_id: &SessionId,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        self.handler
            .execute(session_id.cart_id(), |session| session.begin_pipeline())
            .await
    }

    /// Records the total price computed by the pipeline.
    #[tracing::instrument(skip(self))]
    pub async fn set_total_price(
        &self,
        session_id: &SessionId,
        total: Money,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        self.handler
            .execute(session_id.cart_id(), |session| {
                session.set_total_price(total)
            })
            .await
    }

    /// Records the order id assigned by the pipeline.
    #[tracing::instrument(skip(self))]
    pub async fn record_order(
        &self,
        session_id: &SessionId,
        order_id: AggregateId,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        self.handler
            .execute(session_id.cart_id(), |session| {
                session.record_order(order_id)
            })
            .await
    }

    /// Completes the purchase.
    #[tracing::instrument(skip(self))]
    pub async fn complete_checkout(
        &self,
        session_id: &SessionId,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        metrics::counter!("checkouts_completed").increment(1);
        self.handler
            .execute(session_id.cart_id(), |session| session.complete())
            .await
    }

    /// Fails the purchase.
    #[tracing::instrument(skip(self))]
    pub async fn fail_checkout(
        &self,
        session_id: &SessionId,
        reason: &str,
    ) -> Result<CommandResult<CartSession>, DomainError> {
        metrics::counter!("checkouts_failed").increment(1);
        self.handler
            .execute(session_id.cart_id(), |session| session.fail(reason))
            .await
    }

    /// Loads a session's cart by session id.
    ///
    /// Returns None if no cart exists for the session.
    #[tracing::instrument(skip(self))]
    pub async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<CartSession>, DomainError> {
        self.handler.load_existing(session_id.cart_id()).await
    }
}
