//! Cart session state machine.

use serde::{Deserialize, Serialize};

/// The state of a cart session in its lifecycle.
///
/// State transitions:
/// ```text
/// Open ──► Submitted ──► Processing ──┬──► Completed
///                │                    │
///                └────────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CartState {
    /// Session accepts cart mutations and checkout staging.
    #[default]
    Open,

    /// Checkout data and a user are both present; the cart is frozen and
    /// the pipeline is about to run.
    Submitted,

    /// The checkout pipeline is executing.
    Processing,

    /// The purchase went through (terminal state).
    Completed,

    /// The purchase failed on a non-retryable error (terminal state).
    Failed,
}

impl CartState {
    /// Returns true if cart mutation signals are honored in this state.
    ///
    /// Outside Open every mutation signal is silently ignored; the cart
    /// is frozen at submission.
    pub fn accepts_signals(&self) -> bool {
        matches!(self, CartState::Open)
    }

    /// Returns true if the pipeline may start from this state.
    pub fn can_start_pipeline(&self) -> bool {
        matches!(self, CartState::Submitted)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CartState::Completed | CartState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CartState::Open => "Open",
            CartState::Submitted => "Submitted",
            CartState::Processing => "Processing",
            CartState::Completed => "Completed",
            CartState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CartState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_open() {
        assert_eq!(CartState::default(), CartState::Open);
    }

    #[test]
    fn test_only_open_accepts_signals() {
        assert!(CartState::Open.accepts_signals());
        assert!(!CartState::Submitted.accepts_signals());
        assert!(!CartState::Processing.accepts_signals());
        assert!(!CartState::Completed.accepts_signals());
        assert!(!CartState::Failed.accepts_signals());
    }

    #[test]
    fn test_only_submitted_starts_pipeline() {
        assert!(!CartState::Open.can_start_pipeline());
        assert!(CartState::Submitted.can_start_pipeline());
        assert!(!CartState::Processing.can_start_pipeline());
        assert!(!CartState::Completed.can_start_pipeline());
        assert!(!CartState::Failed.can_start_pipeline());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CartState::Open.is_terminal());
        assert!(!CartState::Submitted.is_terminal());
        assert!(!CartState::Processing.is_terminal());
        assert!(CartState::Completed.is_terminal());
        assert!(CartState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(CartState::Open.to_string(), "Open");
        assert_eq!(CartState::Submitted.to_string(), "Submitted");
        assert_eq!(CartState::Processing.to_string(), "Processing");
        assert_eq!(CartState::Completed.to_string(), "Completed");
        assert_eq!(CartState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_serialization() {
        let state = CartState::Submitted;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: CartState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
