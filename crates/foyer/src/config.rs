//! Chat server configuration.

use std::time::Duration;

use foyer_auth::DEFAULT_CACHE_TTL;
use foyer_room::RoomConfig;
use foyer_transport::DEFAULT_MAX_FRAME_BYTES;
use serde::{Deserialize, Serialize};

/// Everything [`FoyerServerBuilder`](crate::FoyerServerBuilder) needs to
/// stand up a server.
///
/// ```rust
/// use foyer::ServerConfig;
///
/// let config = ServerConfig {
///     default_rooms: vec!["General".into(), "Random".into()],
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.room.history_capacity, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the chat listener binds to.
    pub bind_addr: String,
    /// Longest envelope a client may send, in bytes.
    pub max_frame_bytes: usize,
    /// Settings shared by every room.
    pub room: RoomConfig,
    /// How long a successful token check is trusted before the
    /// authenticator is asked again.
    pub cache_ttl: Duration,
    /// Rooms that exist as soon as the server starts.
    pub default_rooms: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            room: RoomConfig::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            default_rooms: vec!["General".to_string()],
        }
    }
}
