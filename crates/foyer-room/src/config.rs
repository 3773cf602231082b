//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every room in a [`RoomDirectory`](crate::RoomDirectory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// How many recent messages each room keeps for late joiners.
    pub history_capacity: usize,

    /// Whether a room is removed from the directory when its last member
    /// leaves. Off by default: rooms persist until the server stops.
    pub auto_delete_empty_rooms: bool,

    /// Longest room name accepted, in characters.
    pub max_room_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            auto_delete_empty_rooms: false,
            max_room_name_len: 64,
        }
    }
}
