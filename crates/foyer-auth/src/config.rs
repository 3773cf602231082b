//! Configuration for the token authority and its network front end.
//!
//! Plain structs with sensible `Default`s. Override the fields you care
//! about with struct update syntax:
//!
//! ```rust
//! use std::time::Duration;
//! use foyer_auth::AuthConfig;
//!
//! let config = AuthConfig {
//!     token_ttl: Duration::from_secs(15 * 60),
//!     ..AuthConfig::default()
//! };
//! assert_eq!(config.hashing.iterations, 3);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default token lifetime: one hour.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// HashingConfig
// ---------------------------------------------------------------------------

/// Argon2id cost parameters used when hashing new passwords.
///
/// Verification always uses the parameters embedded in the stored hash,
/// so raising these later doesn't lock existing users out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HashingConfig {
    /// The cheapest parameters Argon2 accepts.
    ///
    /// Only for tests and throwaway local setups.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for HashingConfig {
    /// OWASP's recommended Argon2id setting: 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Configuration for [`TokenAuthority`](crate::TokenAuthority).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long an issued token stays valid.
    pub token_ttl: Duration,
    /// Cost parameters for newly registered passwords.
    pub hashing: HashingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: DEFAULT_TOKEN_TTL,
            hashing: HashingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorityConfig
// ---------------------------------------------------------------------------

/// Configuration for [`AuthorityServer`](crate::AuthorityServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Address the authority listens on.
    pub bind_addr: String,
    /// How long a connected peer has to send its request line.
    pub recv_timeout: Duration,
    /// How often expired tokens are swept from memory.
    pub cleanup_interval: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            recv_timeout: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}
