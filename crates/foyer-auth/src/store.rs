//! Where user accounts live.
//!
//! [`UserStore`] is the contract the token authority depends on. Two
//! backends ship with Foyer:
//!
//! - [`InMemoryUserStore`]: a map behind a lock, for tests and demos.
//! - [`JsonFileUserStore`](crate::JsonFileUserStore): the same map,
//!   written through to a JSON file after every change.
//!
//! Every successful mutation is visible to every later call before the
//! mutating call returns.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use crate::{AuthError, User};

/// Persistent storage for user accounts.
///
/// Methods return `impl Future + Send` so a store can be used from
/// spawned tasks behind a generic parameter. Implementations can simply
/// write `async fn`.
pub trait UserStore: Send + Sync + 'static {
    /// Looks up a user by username.
    fn find_user(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, AuthError>> + Send;

    /// Inserts a new user. Returns `false` (and changes nothing) if the
    /// username is taken.
    fn create_user(&self, user: User) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Replaces an existing user. Returns `false` if there is no such
    /// user.
    fn update_user(&self, user: User) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Removes a user. Returns `false` if there was no such user.
    fn delete_user(&self, username: &str)
    -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Returns every stored user, in no particular order.
    fn get_all_users(&self) -> impl Future<Output = Result<Vec<User>, AuthError>> + Send;

    /// Whether `username` is taken.
    fn user_exists(&self, username: &str) -> impl Future<Output = Result<bool, AuthError>> + Send {
        async move { Ok(self.find_user(username).await?.is_some()) }
    }

    /// Number of stored users.
    fn get_user_count(&self) -> impl Future<Output = Result<usize, AuthError>> + Send {
        async move { Ok(self.get_all_users().await?.len()) }
    }
}

// ---------------------------------------------------------------------------
// InMemoryUserStore
// ---------------------------------------------------------------------------

/// A [`UserStore`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create_user(&self, user: User) -> Result<bool, AuthError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Ok(false);
        }
        users.insert(user.username.clone(), user);
        Ok(true)
    }

    async fn update_user(&self, user: User) -> Result<bool, AuthError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.username) {
            Some(existing) => {
                *existing = user;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.users.write().await.remove(username).is_some())
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.users.read().await.contains_key(username))
    }

    async fn get_user_count(&self) -> Result<usize, AuthError> {
        Ok(self.users.read().await.len())
    }
}
