//! The token authority: the source of truth for who is logged in.
//!
//! ```text
//! authenticate() ──→ [active] ──→ revoke()
//!                       │
//!                       ▼ (now > expires_at)
//!                   [expired] ──→ evicted on next lookup or cleanup
//! ```
//!
//! A token is valid iff it is in the active set AND not expired. Expired
//! tokens may still be resident until something looks at them, but they
//! are never reported valid.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::password::{hash_password, verify_password};
use crate::user::is_valid_username;
use crate::{AuthConfig, AuthError, HashingConfig, Token, User, UserInfo, UserStore};

/// Issues, validates and revokes session tokens.
///
/// All token-map access goes through one mutex. Store lookups and
/// password hashing happen before that lock is taken, so a slow hash
/// never blocks validation of other tokens.
pub struct TokenAuthority<S: UserStore> {
    store: S,
    config: AuthConfig,
    tokens: Mutex<HashMap<String, Token>>,
    /// Verified against when the username doesn't exist, so a miss costs
    /// the same as a wrong password.
    dummy_hash: OnceCell<String>,
}

impl<S: UserStore> TokenAuthority<S> {
    /// Creates an authority over `store`.
    pub fn new(store: S, config: AuthConfig) -> Self {
        Self {
            store,
            config,
            tokens: Mutex::new(HashMap::new()),
            dummy_hash: OnceCell::new(),
        }
    }

    /// The user store behind this authority.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration this authority was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------

    /// Checks credentials and issues a new token.
    ///
    /// Returns [`Token::invalid()`] for a wrong password or an unknown
    /// user. Errors are reserved for the store or hasher failing.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let user = self.store.find_user(username).await?;

        let Some(user) = user else {
            // Burn the same time a real verification would.
            let dummy = self.dummy_hash().await?;
            let _ = verify_off_thread(password.to_string(), dummy).await;
            tracing::warn!(username, "authentication failed: unknown user");
            return Ok(Token::invalid());
        };

        if !verify_off_thread(password.to_string(), user.password_hash.clone()).await? {
            tracing::warn!(username, "authentication failed: wrong password");
            return Ok(Token::invalid());
        }

        let token = Token::issue(
            user.username,
            user.display_name,
            user.roles,
            self.config.token_ttl,
        );
        self.tokens
            .lock()
            .await
            .insert(token.value.clone(), token.clone());

        tracing::info!(username, "token issued");
        Ok(token)
    }

    /// Creates a new account with the default role.
    ///
    /// Returns `Ok(false)` if the username is taken; the existing account
    /// is left untouched. An empty `display_name` falls back to the
    /// username.
    ///
    /// # Errors
    /// [`AuthError::InvalidUsername`] for empty or whitespace-containing
    /// names, plus any store or hashing failure.
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<bool, AuthError> {
        if !is_valid_username(username) {
            return Err(AuthError::InvalidUsername(username.to_string()));
        }
        if self.store.user_exists(username).await? {
            return Ok(false);
        }

        let display_name = match display_name.trim() {
            "" => username,
            name => name,
        };
        let hash = hash_off_thread(password.to_string(), self.config.hashing.clone()).await?;

        let created = self
            .store
            .create_user(User::new(username, hash, display_name))
            .await?;
        if created {
            tracing::info!(username, "user registered");
        }
        Ok(created)
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    /// Whether `token` is active and unexpired.
    pub async fn validate(&self, token: &str) -> bool {
        self.lookup(token, |_| ()).await.is_some()
    }

    pub async fn get_username(&self, token: &str) -> Option<String> {
        self.lookup(token, |t| t.username.clone()).await
    }

    pub async fn get_display_name(&self, token: &str) -> Option<String> {
        self.lookup(token, |t| t.display_name.clone()).await
    }

    pub async fn get_roles(&self, token: &str) -> Option<Vec<String>> {
        self.lookup(token, |t| t.roles.clone()).await
    }

    /// Username, display name and roles in one lock acquisition.
    pub async fn get_user_info(&self, token: &str) -> Option<UserInfo> {
        self.lookup(token, |t| UserInfo {
            username: t.username.clone(),
            display_name: t.display_name.clone(),
            roles: t.roles.clone(),
        })
        .await
    }

    /// Runs `f` on the live token, evicting it first if it has expired.
    async fn lookup<T>(&self, token: &str, f: impl FnOnce(&Token) -> T) -> Option<T> {
        if token.is_empty() {
            return None;
        }
        let mut tokens = self.tokens.lock().await;
        let entry = tokens.get(token)?;
        if entry.is_expired_at(Instant::now()) {
            tokens.remove(token);
            tracing::debug!("evicted expired token");
            return None;
        }
        Some(f(entry))
    }

    // -----------------------------------------------------------------
    // Revocation and expiry
    // -----------------------------------------------------------------

    /// Removes `token` from the active set. Revoking an unknown token is
    /// a no-op.
    pub async fn revoke(&self, token: &str) {
        if let Some(revoked) = self.tokens.lock().await.remove(token) {
            tracing::info!(username = %revoked.username, "token revoked");
        }
    }

    /// Drops every expired token. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        before - tokens.len()
    }

    /// Number of tokens currently held (expired ones included until swept).
    pub async fn active_tokens(&self) -> usize {
        self.tokens.lock().await.len()
    }

    /// Sweeps expired tokens every `interval` on a background task.
    pub fn spawn_cleanup(authority: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = authority.cleanup_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "swept expired tokens");
                }
            }
        })
    }

    async fn dummy_hash(&self) -> Result<String, AuthError> {
        let hashing = self.config.hashing.clone();
        self.dummy_hash
            .get_or_try_init(|| hash_off_thread("foyer-dummy-password".to_string(), hashing))
            .await
            .cloned()
    }
}

// Argon2 is deliberately slow; keep it off the async workers.

async fn hash_off_thread(password: String, config: HashingConfig) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .map_err(|e| AuthError::PasswordHashing(e.to_string()))?
}

async fn verify_off_thread(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::PasswordHashing(e.to_string()))?
}

// =========================================================================
// Tests
// =========================================================================
