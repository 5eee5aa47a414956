//! Saga error types.

use common::SessionId;
use domain::DomainError;
use event_store::EventStoreError;
use ledger::LedgerError;
use thiserror::Error;

use crate::retry::StepError;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No cart exists for the session.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session is not in a state the pipeline can run from.
    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    /// A recorded step is missing the result it should have carried.
    #[error("Missing recorded step result: {0}")]
    MissingStepResult(&'static str),

    /// The session actor's mailbox is gone.
    #[error("Session mailbox closed: {0}")]
    MailboxClosed(SessionId),

    /// A pipeline step failed after classification and retries.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        source: StepError,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
