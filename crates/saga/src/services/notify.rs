//! Notification adapter: best-effort message delivery.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::retry::StepError;

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Destination address.
    pub address: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Trait for firing a message at an address.
///
/// Best-effort: no delivery confirmation is required, and callers never
/// roll anything back when delivery fails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a message.
    async fn deliver(&self, message: Message) -> Result<(), StepError>;
}

/// Notifier that writes the message to the log, as the simulation does.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn deliver(&self, message: Message) -> Result<(), StepError> {
        tracing::info!(
            address = %message.address,
            subject = %message.subject,
            body = %message.body,
            "sending email"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingNotifierState {
    sent: Vec<Message>,
    fail_on_deliver: bool,
}

/// Notifier that records messages for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<RwLock<RecordingNotifierState>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail deliveries with a transient error.
    pub fn set_fail_on_deliver(&self, fail: bool) {
        self.state.write().unwrap().fail_on_deliver = fail;
    }

    /// Returns the messages delivered so far.
    pub fn sent(&self) -> Vec<Message> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, message: Message) -> Result<(), StepError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_deliver {
            return Err(StepError::Transient("mail relay unavailable".to_string()));
        }
        state.sent.push(message);
        Ok(())
    }
}
