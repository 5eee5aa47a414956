//! Payment gateway adapter (simulated).

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, UserId};
use rand::Rng;

use crate::retry::StepError;

/// Trait for charging a payment instrument.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the user's payment instrument for the given amount.
    ///
    /// A decline is returned as [`StepError::PaymentDeclined`]
    /// (non-retryable); infrastructure trouble as
    /// [`StepError::Transient`].
    async fn charge(&self, user_id: &UserId, amount: Money) -> Result<(), StepError>;
}

#[derive(Debug, Default)]
struct SimulatedPaymentState {
    /// Pre-scripted outcomes consumed front-to-back; when empty the
    /// approval rate decides.
    scripted: VecDeque<bool>,
    charge_count: u64,
    decline_count: u64,
}

/// Simulated payment gateway.
///
/// Production wiring approves a fixed fraction of charges at random;
/// tests script deterministic outcomes instead.
#[derive(Debug, Clone)]
pub struct SimulatedPaymentGateway {
    approval_rate: f64,
    state: Arc<RwLock<SimulatedPaymentState>>,
}

impl SimulatedPaymentGateway {
    /// Creates a gateway approving the given fraction of charges (0.0–1.0).
    pub fn with_approval_rate(approval_rate: f64) -> Self {
        Self {
            approval_rate,
            state: Arc::new(RwLock::new(SimulatedPaymentState::default())),
        }
    }

    /// Creates a gateway that approves every charge.
    pub fn approving() -> Self {
        Self::with_approval_rate(1.0)
    }

    /// Creates a gateway that declines every charge.
    pub fn declining() -> Self {
        Self::with_approval_rate(0.0)
    }

    /// Queues deterministic outcomes (true = approve) consumed before
    /// the approval rate applies.
    pub fn script_outcomes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.state.write().unwrap().scripted.extend(outcomes);
    }

    /// Returns how many charges were approved.
    pub fn charge_count(&self) -> u64 {
        self.state.read().unwrap().charge_count
    }

    /// Returns how many charges were declined.
    pub fn decline_count(&self) -> u64 {
        self.state.read().unwrap().decline_count
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        // The storefront simulation approves nine charges out of ten.
        Self::with_approval_rate(0.9)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, user_id: &UserId, amount: Money) -> Result<(), StepError> {
        let approved = {
            let mut state = self.state.write().unwrap();
            let approved = match state.scripted.pop_front() {
                Some(outcome) => outcome,
                None => rand::thread_rng().gen_bool(self.approval_rate),
            };
            if approved {
                state.charge_count += 1;
            } else {
                state.decline_count += 1;
            }
            approved
        };

        if approved {
            tracing::info!(%user_id, %amount, "payment successful");
            Ok(())
        } else {
            tracing::info!(%user_id, %amount, "payment declined");
            Err(StepError::PaymentDeclined(
                "not enough money in the bank".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_approving_gateway() {
        let gateway = SimulatedPaymentGateway::approving();
        let result = gateway
            .charge(&UserId::new("1"), Money::from_cents(1000))
            .await;
        assert!(result.is_ok());
        assert_eq!(gateway.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_declining_gateway() {
        let gateway = SimulatedPaymentGateway::declining();
        let result = gateway
            .charge(&UserId::new("1"), Money::from_cents(1000))
            .await;
        assert!(matches!(result, Err(StepError::PaymentDeclined(_))));
        assert_eq!(gateway.decline_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_outcomes_take_precedence() {
        let gateway = SimulatedPaymentGateway::declining();
        gateway.script_outcomes([true, false]);

        assert!(
            gateway
                .charge(&UserId::new("1"), Money::from_cents(100))
                .await
                .is_ok()
        );
        assert!(
            gateway
                .charge(&UserId::new("1"), Money::from_cents(100))
                .await
                .is_err()
        );
        // Script exhausted, back to the (declining) rate.
        assert!(
            gateway
                .charge(&UserId::new("1"), Money::from_cents(100))
                .await
                .is_err()
        );
    }
}
