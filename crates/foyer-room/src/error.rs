//! Error types for the room layer.

use foyer_protocol::ProtocolError;
use foyer_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room by that name, or the room was removed while the caller
    /// held a handle to it.
    #[error("room {0:?} not found")]
    NotFound(String),

    /// A room with that name already exists.
    #[error("room {0:?} already exists")]
    AlreadyExists(String),

    /// The name is empty or too long.
    #[error("invalid room name: {0}")]
    InvalidName(String),

    /// The connection is already a member of this room.
    #[error("{id} already in room {room:?}")]
    AlreadyInRoom { id: ConnectionId, room: String },

    /// A server notice couldn't be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
