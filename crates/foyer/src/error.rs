//! Unified error type for the Foyer server.

use foyer_auth::AuthError;
use foyer_protocol::{ErrorCode, ProtocolError};
use foyer_room::RoomError;
use foyer_transport::TransportError;

/// Top-level error for everything a chat session can run into.
///
/// Sub-crate errors are folded into the handful of outcomes a client can
/// actually be told about, so every variant maps onto one wire
/// [`ErrorCode`] via [`error_code`](Self::error_code).
#[derive(Debug, thiserror::Error)]
pub enum FoyerError {
    /// The token was missing, unknown, expired, revoked, or didn't match
    /// the session's own token.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// A malformed envelope, an unknown type, or a message that isn't
    /// valid in the session's current state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// `CREATE_ROOM` for a name that is taken.
    #[error("room {0:?} already exists")]
    RoomConflict(String),

    /// `JOIN_ROOM` for a name nobody created.
    #[error("room {0:?} not found")]
    RoomNotFound(String),

    /// The peer went away or a read/write on its socket failed.
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] TransportError),

    /// The listening socket couldn't be set up.
    #[error("failed to bind: {0}")]
    Bind(#[source] TransportError),

    /// The server failed to build a message it meant to send.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FoyerError {
    /// The wire code an `ERROR` reply for this error carries.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationFailure(_) => ErrorCode::AuthFailed,
            Self::ProtocolViolation(_) => ErrorCode::ProtocolViolation,
            Self::RoomConflict(_) => ErrorCode::RoomExists,
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::ConnectionLost(_) => ErrorCode::Disconnected,
            Self::Bind(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<RoomError> for FoyerError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::AlreadyExists(name) => Self::RoomConflict(name),
            RoomError::NotFound(name) => Self::RoomNotFound(name),
            RoomError::InvalidName(_) | RoomError::AlreadyInRoom { .. } => {
                Self::ProtocolViolation(err.to_string())
            }
            RoomError::Encode(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ProtocolError> for FoyerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Encode(e) => Self::Internal(e.to_string()),
            other => Self::ProtocolViolation(other.to_string()),
        }
    }
}

impl From<AuthError> for FoyerError {
    fn from(err: AuthError) -> Self {
        Self::AuthenticationFailure(err.to_string())
    }
}
