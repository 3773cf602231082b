//! A short-lived cache of successful token validations.
//!
//! The chat server re-checks the caller's token on every message. Asking
//! the authority each time would put a network round trip in front of
//! every chat line, so successful answers are remembered for a short TTL.
//!
//! The trade-off is bounded staleness: a token revoked just after it was
//! validated keeps working until its cache entry is older than the TTL.
//!
//! ```text
//! t=0   validate → authority says yes → cached
//! t=5   token revoked at the authority
//! t=10  is_trusted → cache hit (5s < 30s) → true
//! t=35  is_trusted → entry stale → authority says no → false, entry dropped
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::Authenticator;

/// How long a successful validation is trusted without re-checking.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Remembers which tokens the authenticator recently said yes to.
///
/// Only successes are cached. A "no" (or an authenticator error) is never
/// remembered, so a token can't get stuck rejected.
pub struct TokenValidationCache<A: Authenticator> {
    authenticator: A,
    ttl: Duration,
    /// token → when it was last confirmed valid.
    entries: Mutex<HashMap<String, Instant>>,
}

impl<A: Authenticator> TokenValidationCache<A> {
    pub fn new(authenticator: A, ttl: Duration) -> Self {
        Self {
            authenticator,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The authenticator consulted on a miss.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `token` should be trusted right now.
    ///
    /// A fresh entry answers immediately. Otherwise the authenticator is
    /// asked (with the cache unlocked) and only a positive answer is
    /// recorded.
    pub async fn is_trusted(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        {
            let entries = self.entries.lock().await;
            if let Some(validated_at) = entries.get(token) {
                if validated_at.elapsed() < self.ttl {
                    return true;
                }
            }
        }

        let valid = match self.authenticator.validate(token).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "token validation failed");
                false
            }
        };

        let mut entries = self.entries.lock().await;
        if valid {
            entries.insert(token.to_string(), Instant::now());
        } else {
            entries.remove(token);
        }
        valid
    }

    /// Records a validation that happened elsewhere, e.g. the handshake's
    /// user lookup.
    pub async fn record(&self, token: &str) {
        if token.is_empty() {
            return;
        }
        self.entries
            .lock()
            .await
            .insert(token.to_string(), Instant::now());
    }

    /// Forgets `token`, forcing the next check to ask the authenticator.
    pub async fn invalidate(&self, token: &str) {
        self.entries.lock().await.remove(token);
    }

    /// Drops every entry older than the TTL. Returns how many were dropped.
    pub async fn purge_stale(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, validated_at| validated_at.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Number of cached entries, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =========================================================================
// Tests
// =========================================================================
