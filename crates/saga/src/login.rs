//! Login async task.
//!
//! A one-shot background credential check per session. The web layer
//! starts the task and polls it with a short timeout; a poll that times
//! out is not a failure — the caller just polls again on a later
//! request. At most one login task runs per session at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::SessionId;
use domain::UserId;
use tokio::sync::{Mutex, watch};

use crate::retry::{RetryPolicy, run_with_retries};
use crate::services::{UserDirectory, UserRecord};

/// The result of a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Whether the credentials matched.
    pub success: bool,
    /// The user id on success.
    pub user_id: Option<UserId>,
    /// The username on success.
    pub username: Option<String>,
    /// The display name on success.
    pub realname: Option<String>,
    /// The email address on success.
    pub email: Option<String>,
}

impl LoginOutcome {
    fn matched(user: UserRecord) -> Self {
        Self {
            success: true,
            user_id: Some(user.id),
            username: Some(user.username),
            realname: Some(user.realname),
            email: Some(user.email),
        }
    }

    fn rejected() -> Self {
        Self {
            success: false,
            user_id: None,
            username: None,
            realname: None,
            email: None,
        }
    }
}

/// What a poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    /// The task has not finished yet (or none is running).
    Pending,
    /// The task finished; the outcome is consumed by this poll.
    Ready(LoginOutcome),
}

/// Runs login tasks, one in flight per session.
pub struct LoginService {
    users: Arc<dyn UserDirectory>,
    retry: RetryPolicy,
    pending: Mutex<HashMap<SessionId, watch::Receiver<Option<LoginOutcome>>>>,
}

impl LoginService {
    /// Creates a new login service over the user directory.
    pub fn new(users: Arc<dyn UserDirectory>, retry: RetryPolicy) -> Self {
        Self {
            users,
            retry,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a credential check for the session.
    ///
    /// Returns false (suppressed) if a check is already in flight for
    /// this session.
    #[tracing::instrument(skip(self, password))]
    pub async fn start(&self, session_id: SessionId, username: String, password: String) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(&session_id) {
            tracing::debug!(%session_id, "login already in flight, suppressed");
            return false;
        }

        let (tx, rx) = watch::channel(None);
        pending.insert(session_id.clone(), rx);
        drop(pending);

        let users = self.users.clone();
        let retry = self.retry.clone();
        tokio::spawn(async move {
            let lookup = run_with_retries(&retry, "get_user", || {
                let users = users.clone();
                let username = username.clone();
                async move { users.find_by_username(&username).await }
            })
            .await;

            // Lookup failure and credential mismatch both surface as a
            // plain rejection, exactly like an unknown user.
            let outcome = match lookup {
                Ok(Some(user)) if user.password == password => LoginOutcome::matched(user),
                Ok(_) => LoginOutcome::rejected(),
                Err(error) => {
                    tracing::warn!(%session_id, %error, "credential lookup failed");
                    LoginOutcome::rejected()
                }
            };
            let _ = tx.send(Some(outcome));
        });

        true
    }

    /// Waits up to `timeout` for the session's login task to finish.
    ///
    /// `Ready` removes the task; subsequent polls report `Pending` until
    /// a new task is started.
    #[tracing::instrument(skip(self))]
    pub async fn poll(&self, session_id: &SessionId, timeout: Duration) -> LoginPoll {
        let rx = {
            let pending = self.pending.lock().await;
            match pending.get(session_id) {
                Some(rx) => rx.clone(),
                None => return LoginPoll::Pending,
            }
        };

        let mut rx = rx;
        let outcome = match tokio::time::timeout(timeout, rx.wait_for(|outcome| outcome.is_some()))
            .await
        {
            Ok(Ok(guard)) => (*guard).clone(),
            _ => return LoginPoll::Pending,
        };

        self.pending.lock().await.remove(session_id);
        LoginPoll::Ready(outcome.unwrap_or_else(LoginOutcome::rejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryUserDirectory;

    fn service() -> LoginService {
        LoginService::new(
            Arc::new(InMemoryUserDirectory::with_defaults()),
            RetryPolicy::immediate(3),
        )
    }

    #[tokio::test]
    async fn test_successful_login() {
        let service = service();
        let session_id = SessionId::from_string("s-1");

        assert!(
            service
                .start(session_id.clone(), "alice".to_string(), "pass123".to_string())
                .await
        );

        let poll = service.poll(&session_id, Duration::from_secs(1)).await;
        let LoginPoll::Ready(outcome) = poll else {
            panic!("expected Ready");
        };
        assert!(outcome.success);
        assert_eq!(outcome.user_id, Some(UserId::new("1")));
        assert_eq!(outcome.username.as_deref(), Some("alice"));
        assert_eq!(outcome.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let service = service();
        let session_id = SessionId::from_string("s-1");

        service
            .start(session_id.clone(), "alice".to_string(), "wrong".to_string())
            .await;

        let LoginPoll::Ready(outcome) = service.poll(&session_id, Duration::from_secs(1)).await
        else {
            panic!("expected Ready");
        };
        assert!(!outcome.success);
        assert!(outcome.user_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let service = service();
        let session_id = SessionId::from_string("s-1");

        service
            .start(session_id.clone(), "nobody".to_string(), "x".to_string())
            .await;

        let LoginPoll::Ready(outcome) = service.poll(&session_id, Duration::from_secs(1)).await
        else {
            panic!("expected Ready");
        };
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_lookup_failure_rejected() {
        let users = Arc::new(InMemoryUserDirectory::with_defaults());
        users.set_fail_on_lookup(true);
        let service = LoginService::new(users, RetryPolicy::immediate(2));
        let session_id = SessionId::from_string("s-1");

        service
            .start(session_id.clone(), "alice".to_string(), "pass123".to_string())
            .await;

        let LoginPoll::Ready(outcome) = service.poll(&session_id, Duration::from_secs(1)).await
        else {
            panic!("expected Ready");
        };
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_second_start_is_suppressed_while_pending() {
        let users = Arc::new(InMemoryUserDirectory::with_defaults());
        users.set_fail_on_lookup(true); // slow path: keep it retrying
        let service = LoginService::new(
            users.clone(),
            RetryPolicy::new(3, Duration::from_millis(50)),
        );
        let session_id = SessionId::from_string("s-1");

        assert!(
            service
                .start(session_id.clone(), "alice".to_string(), "pass123".to_string())
                .await
        );
        assert!(
            !service
                .start(session_id.clone(), "alice".to_string(), "pass123".to_string())
                .await
        );
    }

    #[tokio::test]
    async fn test_poll_without_task_is_pending() {
        let service = service();
        let poll = service
            .poll(&SessionId::from_string("s-1"), Duration::from_millis(10))
            .await;
        assert_eq!(poll, LoginPoll::Pending);
    }

    #[tokio::test]
    async fn test_poll_timeout_is_pending_not_failure() {
        let users = Arc::new(InMemoryUserDirectory::with_defaults());
        users.set_fail_on_lookup(true);
        // Long backoff keeps the task pending across the short poll.
        let service = LoginService::new(users, RetryPolicy::new(3, Duration::from_secs(5)));
        let session_id = SessionId::from_string("s-1");

        service
            .start(session_id.clone(), "alice".to_string(), "pass123".to_string())
            .await;

        let poll = service.poll(&session_id, Duration::from_millis(20)).await;
        assert_eq!(poll, LoginPoll::Pending);
    }

    #[tokio::test]
    async fn test_ready_is_consumed_once() {
        let service = service();
        let session_id = SessionId::from_string("s-1");
        service
            .start(session_id.clone(), "bob".to_string(), "secret".to_string())
            .await;

        let first = service.poll(&session_id, Duration::from_secs(1)).await;
        assert!(matches!(first, LoginPoll::Ready(_)));

        let second = service.poll(&session_id, Duration::from_millis(10)).await;
        assert_eq!(second, LoginPoll::Pending);

        // A new task may start after consumption.
        assert!(
            service
                .start(session_id.clone(), "bob".to_string(), "secret".to_string())
                .await
        );
    }
}
