//! Session tokens: what a successful login buys you.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// A session token issued by the [`TokenAuthority`](crate::TokenAuthority).
///
/// The `value` is the secret the client presents on every request; the
/// other fields are the identity it stands for. Times use Tokio's clock so
/// expiry can be tested with paused time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// 32 lowercase hex characters (128 random bits). Empty on the invalid
    /// token.
    pub value: String,
    pub username: String,
    pub display_name: String,
    pub roles: Vec<String>,
    pub issued_at: Instant,
    /// `None` when the validity window is too long for the clock to
    /// represent; such a token never expires.
    pub expires_at: Option<Instant>,
    pub is_valid: bool,
}

impl Token {
    pub(crate) fn issue(
        username: String,
        display_name: String,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let issued_at = Instant::now();
        Self {
            value: generate_token_value(),
            username,
            display_name,
            roles,
            issued_at,
            expires_at: issued_at.checked_add(ttl),
            is_valid: true,
        }
    }

    /// The token returned for a failed login.
    pub fn invalid() -> Self {
        let now = Instant::now();
        Self {
            value: String::new(),
            username: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            issued_at: now,
            expires_at: Some(now),
            is_valid: false,
        }
    }

    /// Whether the token's validity window has passed at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token_value() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
