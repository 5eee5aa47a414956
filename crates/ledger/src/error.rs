//! Ledger error types.

use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Insufficient stock is not an error — it is a regular outcome of
/// `reserve` (see [`crate::ReserveOutcome`]). Errors here mean the
/// ledger could not do its job at all (storage failure), which callers
/// treat as transient and retry.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store rejected a write.
    #[error("Ledger store error: {0}")]
    Store(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
