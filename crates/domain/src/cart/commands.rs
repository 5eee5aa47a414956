//! Cart session commands.

use common::{AggregateId, SessionId};

use crate::command::Command;

use super::{CartItem, CartSession, CheckoutInfo, ProductId, UserId};

/// Command to open a new cart session.
#[derive(Debug, Clone)]
pub struct OpenSession {
    /// The browser session to open a cart for.
    pub session_id: SessionId,

    /// The signed-in user, if the session already has one.
    pub user_id: Option<UserId>,
}

impl OpenSession {
    /// Creates a new OpenSession command.
    pub fn new(session_id: SessionId, user_id: Option<UserId>) -> Self {
        Self {
            session_id,
            user_id,
        }
    }
}

impl Command for OpenSession {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}

/// Command to add one unit of a product to the cart.
#[derive(Debug, Clone)]
pub struct AddItem {
    /// The owning session.
    pub session_id: SessionId,

    /// The product to add.
    pub product_id: ProductId,
}

impl AddItem {
    /// Creates a new AddItem command.
    pub fn new(session_id: SessionId, product_id: impl Into<ProductId>) -> Self {
        Self {
            session_id,
            product_id: product_id.into(),
        }
    }
}

impl Command for AddItem {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}

/// Command to remove a product's line from the cart.
#[derive(Debug, Clone)]
pub struct RemoveItem {
    /// The owning session.
    pub session_id: SessionId,

    /// The product whose line to remove.
    pub product_id: ProductId,
}

impl RemoveItem {
    /// Creates a new RemoveItem command.
    pub fn new(session_id: SessionId, product_id: impl Into<ProductId>) -> Self {
        Self {
            session_id,
            product_id: product_id.into(),
        }
    }
}

impl Command for RemoveItem {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}

/// Command to replace quantities of existing cart lines.
#[derive(Debug, Clone)]
pub struct ReviseCart {
    /// The owning session.
    pub session_id: SessionId,

    /// New quantities per line.
    pub items: Vec<CartItem>,
}

impl ReviseCart {
    /// Creates a new ReviseCart command.
    pub fn new(session_id: SessionId, items: Vec<CartItem>) -> Self {
        Self { session_id, items }
    }
}

impl Command for ReviseCart {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}

/// Command to attach a user to the session.
#[derive(Debug, Clone)]
pub struct AssignUser {
    /// The owning session.
    pub session_id: SessionId,

    /// The user to attach.
    pub user_id: UserId,
}

impl AssignUser {
    /// Creates a new AssignUser command.
    pub fn new(session_id: SessionId, user_id: impl Into<UserId>) -> Self {
        Self {
            session_id,
            user_id: user_id.into(),
        }
    }
}

impl Command for AssignUser {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}

/// Command to stage checkout form data.
#[derive(Debug, Clone)]
pub struct StageCheckout {
    /// The owning session.
    pub session_id: SessionId,

    /// Address/payment fields from the form.
    pub info: CheckoutInfo,
}

impl StageCheckout {
    /// Creates a new StageCheckout command.
    pub fn new(session_id: SessionId, info: CheckoutInfo) -> Self {
        Self { session_id, info }
    }
}

impl Command for StageCheckout {
    type Aggregate = CartSession;

    fn aggregate_id(&self) -> AggregateId {
        self.session_id.cart_id()
    }
}
