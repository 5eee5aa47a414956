//! Collaborator service traits and in-memory implementations.
//!
//! Each collaborator is an independently-owned service consumed through
//! a narrow request/response contract. The adapters classify every
//! failure as a [`crate::retry::StepError`] before it reaches the
//! coordinator, and fold conflicts-as-success (duplicate ids) away.

pub mod catalog;
pub mod images;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod recommendations;
pub mod users;

pub use catalog::{CatalogClient, CategoryListing, InMemoryCatalog, ProductListing};
pub use images::{ImageStore, InMemoryImageStore};
pub use notify::{Message, Notifier, RecordingNotifier, TracingNotifier};
pub use orders::{
    AppendOutcome, InMemoryOrderStore, OrderLine, OrderRecord, OrderStore,
};
pub use payment::{PaymentGateway, SimulatedPaymentGateway};
pub use recommendations::{InMemoryRecommendationStore, RecommendationStore};
pub use users::{InMemoryUserDirectory, UserDirectory, UserRecord};
