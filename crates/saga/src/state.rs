//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout saga record in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Saga has not started yet.
    #[default]
    NotStarted,

    /// Pipeline steps are being executed.
    Running,

    /// A step failed and compensating actions are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::Running => "Running",
            CheckoutState::Compensating => "Compensating",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(CheckoutState::default(), CheckoutState::NotStarted);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CheckoutState::NotStarted.is_terminal());
        assert!(!CheckoutState::Running.is_terminal());
        assert!(!CheckoutState::Compensating.is_terminal());
        assert!(CheckoutState::Completed.is_terminal());
        assert!(CheckoutState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(CheckoutState::Running.to_string(), "Running");
        assert_eq!(CheckoutState::Compensating.to_string(), "Compensating");
    }

    #[test]
    fn test_serialization() {
        let state = CheckoutState::Running;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: CheckoutState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
