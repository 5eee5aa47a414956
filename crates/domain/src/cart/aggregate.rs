//! Cart session aggregate implementation.

use common::{AggregateId, SessionId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    CartError, CartEvent, CartItem, CartState, CheckoutInfo, Money, OrderInfo, ProductId, UserId,
    events::{ItemsRevisedData, SessionOpenedData},
};

/// Cart session aggregate root.
///
/// One instance per browser session, holding the cart lines and the
/// accumulating order info, and gating the transition into the checkout
/// pipeline. Cart mutation signals are honored only while the session is
/// Open; afterwards they are silently ignored (the front end fires them
/// without awaiting an outcome, so a frozen cart swallows them rather
/// than erroring).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartSession {
    /// Cart aggregate id, derived from the session id.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Current state of the session.
    state: CartState,

    /// Cart lines in the order the front end created them.
    items: Vec<CartItem>,

    /// The accumulating order record.
    info: OrderInfo,
}

impl Aggregate for CartSession {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "CartSession"
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
            CartEvent::SessionOpened(data) => self.apply_session_opened(data),
            CartEvent::ItemAdded(data) => self.apply_item_added(data.product_id),
            CartEvent::ItemRemoved(data) => {
                self.items.retain(|item| item.product_id != data.product_id);
            }
            CartEvent::ItemsRevised(data) => self.apply_items_revised(data),
            CartEvent::UserAssigned(data) => {
                self.info.user_id = Some(data.user_id);
            }
            CartEvent::CheckoutStaged(data) => {
                self.info.checkout = Some(data.info);
            }
            CartEvent::CheckoutSubmitted(_) => {
                self.state = CartState::Submitted;
            }
            CartEvent::PipelineStarted(_) => {
                self.state = CartState::Processing;
            }
            CartEvent::OrderPriced(data) => {
                self.info.total_price = Some(data.total_price);
            }
            CartEvent::OrderRecorded(data) => {
                self.info.order_id = Some(data.order_id);
            }
            CartEvent::CheckoutCompleted(_) => {
                self.state = CartState::Completed;
            }
            CartEvent::CheckoutFailed(_) => {
                self.state = CartState::Failed;
            }
        }
    }
}

impl SnapshotCapable for CartSession {
    fn snapshot_interval() -> usize {
        50 // Snapshot every 50 events
    }
}

// Query methods
impl CartSession {
    /// Returns the owning session id.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.info.session_id.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> CartState {
        self.state
    }

    /// Returns the cart lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns a line by product ID.
    pub fn get_item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Returns the accumulating order info.
    pub fn info(&self) -> &OrderInfo {
        &self.info
    }

    /// Returns the attached user, if any.
    pub fn user_id(&self) -> Option<&UserId> {
        self.info.user_id.as_ref()
    }

    /// Returns true if the cart has at least one line.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns true if the session is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn can_submit(&self) -> bool {
        self.info.checkout.is_some() && self.info.user_id.is_some()
    }
}

// Command methods (return events)
impl CartSession {
    /// Opens a new session.
    pub fn open(
        &self,
        cart_id: AggregateId,
        session_id: SessionId,
        user_id: Option<UserId>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyOpened);
        }

        Ok(vec![CartEvent::session_opened(cart_id, session_id, user_id)])
    }

    /// Adds one unit of a product to the cart.
    ///
    /// Quantities merge: adding a product already in the cart bumps its
    /// line by one. Silently ignored once the cart is frozen.
    pub fn add_item(&self, product_id: ProductId) -> Result<Vec<CartEvent>, CartError> {
        if !self.state.accepts_signals() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::item_added(product_id)])
    }

    /// Removes a product's line from the cart.
    ///
    /// Silently ignored once the cart is frozen, or if the product is
    /// not in the cart.
    pub fn remove_item(&self, product_id: ProductId) -> Result<Vec<CartEvent>, CartError> {
        if !self.state.accepts_signals() || self.get_item(&product_id).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::item_removed(product_id)])
    }

    /// Replaces quantities of existing cart lines.
    ///
    /// Only lines whose product is already in the cart are updated;
    /// unknown products are dropped. A quantity of zero removes the
    /// line. Silently ignored once the cart is frozen.
    pub fn revise_items(&self, items: Vec<CartItem>) -> Result<Vec<CartEvent>, CartError> {
        if !self.state.accepts_signals() {
            return Ok(vec![]);
        }

        let known: Vec<CartItem> = items
            .into_iter()
            .filter(|item| self.get_item(&item.product_id).is_some())
            .collect();

        if known.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::items_revised(known)])
    }

    /// Attaches a user to the session.
    ///
    /// If checkout data was already staged, this completes the submission
    /// guard ("submitted once both pieces exist"). Silently ignored once
    /// the cart is frozen — a user who submits while anonymous cannot
    /// finish that purchase.
    pub fn assign_user(&self, user_id: UserId) -> Result<Vec<CartEvent>, CartError> {
        if !self.state.accepts_signals() {
            return Ok(vec![]);
        }

        let mut events = vec![CartEvent::user_assigned(user_id)];
        if self.info.checkout.is_some() {
            events.push(CartEvent::checkout_submitted());
        }
        Ok(events)
    }

    /// Stages address/payment fields from the checkout form.
    ///
    /// Fires the Submitted transition only if a user is already attached;
    /// otherwise the data is held until a `assign_user` arrives. Silently
    /// ignored once the cart is frozen.
    pub fn stage_checkout(&self, info: CheckoutInfo) -> Result<Vec<CartEvent>, CartError> {
        if !self.state.accepts_signals() {
            return Ok(vec![]);
        }

        let mut events = vec![CartEvent::checkout_staged(info)];
        if self.info.user_id.is_some() {
            events.push(CartEvent::checkout_submitted());
        }
        Ok(events)
    }

    /// Marks the pipeline as running.
    ///
    /// Idempotent when the pipeline already started (crash replay).
    pub fn begin_pipeline(&self) -> Result<Vec<CartEvent>, CartError> {
        match self.state {
            CartState::Submitted => Ok(vec![CartEvent::pipeline_started()]),
            CartState::Processing => Ok(vec![]),
            _ => Err(CartError::InvalidStateTransition {
                current_state: self.state,
                action: "begin pipeline",
            }),
        }
    }

    /// Records the total price computed by the pipeline.
    pub fn set_total_price(&self, total: Money) -> Result<Vec<CartEvent>, CartError> {
        if self.state != CartState::Processing {
            return Err(CartError::InvalidStateTransition {
                current_state: self.state,
                action: "set total price",
            });
        }
        if self.info.total_price == Some(total) {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::order_priced(total)])
    }

    /// Records the order id assigned by the pipeline.
    pub fn record_order(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.state != CartState::Processing {
            return Err(CartError::InvalidStateTransition {
                current_state: self.state,
                action: "record order",
            });
        }
        if self.info.order_id == Some(order_id) {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::order_recorded(order_id)])
    }

    /// Completes the purchase.
    pub fn complete(&self) -> Result<Vec<CartEvent>, CartError> {
        match self.state {
            CartState::Processing => Ok(vec![CartEvent::checkout_completed()]),
            CartState::Completed => Ok(vec![]),
            _ => Err(CartError::InvalidStateTransition {
                current_state: self.state,
                action: "complete",
            }),
        }
    }

    /// Fails the purchase.
    pub fn fail(&self, reason: impl Into<String>) -> Result<Vec<CartEvent>, CartError> {
        match self.state {
            CartState::Submitted | CartState::Processing => {
                Ok(vec![CartEvent::checkout_failed(reason)])
            }
            CartState::Failed => Ok(vec![]),
            _ => Err(CartError::InvalidStateTransition {
                current_state: self.state,
                action: "fail",
            }),
        }
    }
}

// Apply event helpers
impl CartSession {
    fn apply_session_opened(&mut self, data: SessionOpenedData) {
        self.id = Some(data.cart_id);
        self.info.session_id = Some(data.session_id);
        self.info.user_id = data.user_id;
        self.state = CartState::Open;
    }

    fn apply_item_added(&mut self, product_id: ProductId) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            item.quantity += 1;
        } else {
            self.items.push(CartItem::new(product_id, 1));
        }
    }

    fn apply_items_revised(&mut self, data: ItemsRevisedData) {
        for revised in data.items {
            if revised.quantity == 0 {
                self.items
                    .retain(|item| item.product_id != revised.product_id);
            } else if let Some(item) = self
                .items
                .iter_mut()
                .find(|item| item.product_id == revised.product_id)
            {
                item.quantity = revised.quantity;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;

    fn open_session() -> (CartSession, SessionId) {
        let mut session = CartSession::default();
        let session_id = SessionId::from_string("s-test");
        let events = session
            .open(session_id.cart_id(), session_id.clone(), None)
            .unwrap();
        session.apply_events(events);
        (session, session_id)
    }

    fn open_session_with_user() -> (CartSession, SessionId) {
        let (mut session, session_id) = open_session();
        session.apply_events(session.assign_user(UserId::new("1")).unwrap());
        (session, session_id)
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

    #[test]
    fn test_open_session() {
        let (session, session_id) = open_session();
        assert_eq!(session.id(), Some(session_id.cart_id()));
        assert_eq!(session.session_id(), Some(&session_id));
        assert_eq!(session.state(), CartState::Open);
        assert!(!session.has_items());
    }

    #[test]
    fn test_open_twice_fails() {
        let (session, _) = open_session();
        let other = SessionId::from_string("s-other");
        let result = session.open(other.cart_id(), other, None);
        assert!(matches!(result, Err(CartError::AlreadyOpened)));
    }

    #[test]
    fn test_add_item_appends_line() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());

        assert_eq!(session.items().len(), 1);
        assert_eq!(session.get_item(&ProductId::new("P1")).unwrap().quantity, 1);
    }

    #[test]
    fn test_add_item_merges_quantity() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.add_item(ProductId::new("P2")).unwrap());

        assert_eq!(session.items().len(), 2);
        assert_eq!(session.get_item(&ProductId::new("P1")).unwrap().quantity, 2);
        assert_eq!(session.get_item(&ProductId::new("P2")).unwrap().quantity, 1);
    }

    #[test]
    fn test_remove_item() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.remove_item(ProductId::new("P1")).unwrap());

        assert!(!session.has_items());
    }

    #[test]
    fn test_remove_unknown_item_is_noop() {
        let (session, _) = open_session();
        let events = session.remove_item(ProductId::new("P9")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_revise_items_updates_known_lines_only() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.add_item(ProductId::new("P2")).unwrap());

        let events = session
            .revise_items(vec![
                CartItem::new("P1", 5),
                CartItem::new("P9", 7), // unknown, dropped
            ])
            .unwrap();
        session.apply_events(events);

        assert_eq!(session.get_item(&ProductId::new("P1")).unwrap().quantity, 5);
        assert!(session.get_item(&ProductId::new("P9")).is_none());
    }

    #[test]
    fn test_revise_items_zero_quantity_removes_line() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.revise_items(vec![CartItem::new("P1", 0)]).unwrap());

        assert!(!session.has_items());
    }

    #[test]
    fn test_submit_with_user_present_freezes_cart() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());

        let events = session.stage_checkout(checkout_info()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), "CheckoutSubmitted");
        session.apply_events(events);

        assert_eq!(session.state(), CartState::Submitted);
        assert!(session.info().checkout.is_some());
    }

    #[test]
    fn test_submit_without_user_holds_data() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());

        let events = session.stage_checkout(checkout_info()).unwrap();
        assert_eq!(events.len(), 1);
        session.apply_events(events);

        // Data held, submission did not fire
        assert_eq!(session.state(), CartState::Open);
        assert!(session.info().checkout.is_some());
    }

    #[test]
    fn test_late_user_completes_staged_submission() {
        let (mut session, _) = open_session();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());

        let events = session.assign_user(UserId::new("1")).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), "CheckoutSubmitted");
        session.apply_events(events);

        assert_eq!(session.state(), CartState::Submitted);
    }

    #[test]
    fn test_signals_silently_ignored_after_submission() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());
        assert_eq!(session.state(), CartState::Submitted);

        assert!(session.add_item(ProductId::new("P2")).unwrap().is_empty());
        assert!(session.remove_item(ProductId::new("P1")).unwrap().is_empty());
        assert!(
            session
                .revise_items(vec![CartItem::new("P1", 9)])
                .unwrap()
                .is_empty()
        );
        assert!(session.assign_user(UserId::new("2")).unwrap().is_empty());
        assert!(session.stage_checkout(checkout_info()).unwrap().is_empty());

        // Cart unchanged
        assert_eq!(session.items().len(), 1);
        assert_eq!(session.get_item(&ProductId::new("P1")).unwrap().quantity, 1);
        assert_eq!(session.user_id(), Some(&UserId::new("1")));
    }

    #[test]
    fn test_full_checkout_lifecycle() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());

        session.apply_events(session.begin_pipeline().unwrap());
        assert_eq!(session.state(), CartState::Processing);

        session.apply_events(session.set_total_price(Money::from_cents(2500)).unwrap());
        assert_eq!(session.info().total_price, Some(Money::from_cents(2500)));

        let order_id = AggregateId::new();
        session.apply_events(session.record_order(order_id).unwrap());
        assert_eq!(session.info().order_id, Some(order_id));

        session.apply_events(session.complete().unwrap());
        assert_eq!(session.state(), CartState::Completed);
        assert!(session.is_terminal());
    }

    #[test]
    fn test_begin_pipeline_is_idempotent_while_processing() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());
        session.apply_events(session.begin_pipeline().unwrap());

        let events = session.begin_pipeline().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_begin_pipeline_from_open_fails() {
        let (session, _) = open_session();
        let result = session.begin_pipeline();
        assert!(matches!(
            result,
            Err(CartError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_failed_checkout() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());
        session.apply_events(session.begin_pipeline().unwrap());

        session.apply_events(session.fail("payment declined").unwrap());
        assert_eq!(session.state(), CartState::Failed);
        assert!(session.is_terminal());

        // Cart content preserved as of the last successful signal
        assert_eq!(session.items().len(), 1);
    }

    #[test]
    fn test_cannot_complete_terminal_session() {
        let (mut session, _) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());
        session.apply_events(session.stage_checkout(checkout_info()).unwrap());
        session.apply_events(session.begin_pipeline().unwrap());
        session.apply_events(session.fail("declined").unwrap());

        let result = session.complete();
        assert!(matches!(
            result,
            Err(CartError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_serialization() {
        let (mut session, session_id) = open_session_with_user();
        session.apply_events(session.add_item(ProductId::new("P1")).unwrap());

        let json = serde_json::to_string(&session).unwrap();
        let deserialized: CartSession = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.id(), Some(session_id.cart_id()));
        assert_eq!(deserialized.items().len(), 1);
        assert_eq!(deserialized.state(), CartState::Open);
    }
}
