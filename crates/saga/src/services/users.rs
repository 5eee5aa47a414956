//! User directory adapter: credential and profile lookup.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::UserId;

use crate::retry::StepError;

/// A user record as stored by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// The user id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub realname: String,
    /// Email address for notifications.
    pub email: String,
    /// Stored credential (simulated directory, plain comparison).
    pub password: String,
}

/// Trait for user directory lookups.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks a user up by id.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StepError>;

    /// Looks a user up by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryUserDirectoryState {
    users: Vec<UserRecord>,
    fail_on_lookup: bool,
}

/// In-memory user directory for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<InMemoryUserDirectoryState>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory seeded with the demo users.
    pub fn with_defaults() -> Self {
        let directory = Self::new();
        {
            let mut state = directory.state.write().unwrap();
            state.users = vec![
                UserRecord {
                    id: UserId::new("1"),
                    username: "alice".to_string(),
                    realname: "Alice Smith".to_string(),
                    email: "alice@example.com".to_string(),
                    password: "pass123".to_string(),
                },
                UserRecord {
                    id: UserId::new("2"),
                    username: "bob".to_string(),
                    realname: "Bob Jones".to_string(),
                    email: "bob@example.com".to_string(),
                    password: "secret".to_string(),
                },
                UserRecord {
                    id: UserId::new("3"),
                    username: "user2".to_string(),
                    realname: "Testuser".to_string(),
                    email: "test@email.com".to_string(),
                    password: "password".to_string(),
                },
            ];
        }
        directory
    }

    /// Adds a user to the directory.
    pub fn add_user(&self, user: UserRecord) {
        self.state.write().unwrap().users.push(user);
    }

    /// Configures the directory to fail lookups with a transient error.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(StepError::Transient("user directory unavailable".to_string()));
        }
        Ok(state.users.iter().find(|user| &user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StepError> {
        let state = self.state.read().unwrap();
        if state.fail_on_lookup {
            return Err(StepError::Transient("user directory unavailable".to_string()));
        }
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_id() {
        let directory = InMemoryUserDirectory::with_defaults();
        let user = directory.find_by_id(&UserId::new("1")).await.unwrap();
        assert_eq!(user.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_find_by_username() {
        let directory = InMemoryUserDirectory::with_defaults();
        let user = directory.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(user.id, UserId::new("2"));
        assert_eq!(user.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let directory = InMemoryUserDirectory::with_defaults();
        assert!(directory.find_by_username("nobody").await.unwrap().is_none());
        assert!(directory.find_by_id(&UserId::new("99")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_on_lookup() {
        let directory = InMemoryUserDirectory::with_defaults();
        directory.set_fail_on_lookup(true);
        let result = directory.find_by_username("alice").await;
        assert!(matches!(result, Err(StepError::Transient(_))));
    }
}
