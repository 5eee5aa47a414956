//! Checkout saga orchestration.
//!
//! This crate drives the multi-step purchase transaction across
//! independently-failing collaborators with compensating actions on
//! partial failure:
//! 1. Reserve stock (all-or-nothing, idempotent by reservation id)
//! 2. Price the cart
//! 3. Charge payment (declined ⇒ release the reservation)
//! 4. Persist the order (idempotent)
//! 5. Persist line items (idempotent per line)
//! 6. Wake the recommendation refresh job
//! 7. Send the confirmation email (best-effort)
//! 8. Spawn the shipping sub-saga
//!
//! Progress is event-sourced so a crashed pipeline resumes from its last
//! durable checkpoint without repeating committed effects. Sessions run
//! as single-owner actors: signals serialize through a mailbox, queries
//! read a published snapshot.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod instance;
pub mod login;
pub mod recommendation;
pub mod registry;
pub mod retry;
pub mod services;
pub mod shipping;
pub mod state;
pub mod steps;

pub use coordinator::{CheckoutCoordinator, Collaborators};
pub use error::SagaError;
pub use events::CheckoutEvent;
pub use instance::CheckoutSaga;
pub use login::{LoginOutcome, LoginPoll, LoginService};
pub use recommendation::{RecommendationJob, RecommendationTrigger};
pub use registry::{CartSignal, CartView, SessionHandle, SessionRegistry};
pub use retry::{RetryPolicy, StepError, run_with_retries};
pub use services::{
    AppendOutcome, CatalogClient, CategoryListing, ImageStore, InMemoryCatalog,
    InMemoryImageStore, InMemoryOrderStore, InMemoryRecommendationStore, InMemoryUserDirectory,
    Message, Notifier, OrderLine, OrderRecord, OrderStore, PaymentGateway, ProductListing,
    RecommendationStore, RecordingNotifier, SimulatedPaymentGateway, TracingNotifier,
    UserDirectory, UserRecord,
};
pub use shipping::{ShippingConfig, ShippingStatus, ShippingSubSaga, ShippingTracker};
pub use state::CheckoutState;
