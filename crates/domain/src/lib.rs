//! Domain layer for the checkout core.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - CartSession aggregate: the per-session purchase state machine

pub mod aggregate;
pub mod cart;
pub mod command;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{
    AddItem, AssignUser, CartError, CartEvent, CartItem, CartService, CartSession, CartState,
    CheckoutInfo, Money, OpenSession, OrderInfo, ProductId, RemoveItem, ReviseCart, StageCheckout,
    UserId,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
