//! Chat protocol types: everything that travels between a chat client and
//! the server.
//!
//! Every message on the wire is an [`Envelope`]:
//!
//! ```text
//! {"header":{"timestamp":"2026-01-17T12:34:56Z","token":"9f2c..."},
//!  "body":{"type":"CHAT_MESSAGE","data":{"message":"hello"}}}
//! ```
//!
//! The header carries the caller's session token on every client request,
//! so the server can re-check it per action. Server messages leave the
//! token empty.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Timestamp format used in envelope headers (UTC, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Returns the current UTC time formatted for an envelope header.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable reason attached to an `ERROR` body.
///
/// Clients switch on the code; the accompanying `message` is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad credentials, or an invalid/expired/unknown token.
    AuthFailed,
    /// Malformed envelope, unknown type, or a message not valid in the
    /// sender's current state.
    #[default]
    ProtocolViolation,
    /// `CREATE_ROOM` with a name that is already taken.
    RoomExists,
    /// `JOIN_ROOM` for a room that doesn't exist.
    RoomNotFound,
    /// Acknowledges a `QUIT`; the server closes the connection next.
    Disconnected,
    /// The server failed to process an otherwise valid request.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::RoomExists => "ROOM_EXISTS",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::Disconnected => "DISCONNECTED",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// The typed content of an envelope.
///
/// `#[serde(tag = "type", content = "data")]` produces the adjacently
/// tagged shape `{"type":"JOIN_ROOM","data":{"room_name":"lobby"}}`.
/// Variants without payload are empty struct variants so they still carry
/// `"data":{}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Body {
    // -- Client → Server --
    /// Authenticate with the token carried in the header.
    Auth {},

    /// Create a room and join it.
    CreateRoom { room_name: String },

    /// Join an existing room.
    JoinRoom { room_name: String },

    /// Ask for the room directory again.
    RefreshRooms {},

    /// Leave the current room and return to the foyer.
    Leave {},

    /// Say something in the current room.
    ChatMessage { message: String },

    /// Leave everything and disconnect.
    Quit {},

    // -- Server → Client --
    /// Something went wrong with the last request.
    Error {
        message: String,
        #[serde(default)]
        code: ErrorCode,
    },

    /// The client is now in `room_name`.
    RoomJoined { room_name: String },

    /// The client is back in the foyer.
    LeftRoom {},

    /// The room directory. `member_counts[i]` is the live member count of
    /// `rooms[i]`.
    RoomList {
        rooms: Vec<String>,
        #[serde(default)]
        member_counts: Vec<usize>,
    },

    /// A chat line (or a server notice when `sender` is `"SERVER"`).
    Message { sender: String, message: String },

    /// Display names of everyone currently in the room.
    ParticipantList { participants: Vec<String> },
}

impl Body {
    /// Returns the wire name of this body's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth {} => "AUTH",
            Self::CreateRoom { .. } => "CREATE_ROOM",
            Self::JoinRoom { .. } => "JOIN_ROOM",
            Self::RefreshRooms {} => "REFRESH_ROOMS",
            Self::Leave {} => "LEAVE",
            Self::ChatMessage { .. } => "CHAT_MESSAGE",
            Self::Quit {} => "QUIT",
            Self::Error { .. } => "ERROR",
            Self::RoomJoined { .. } => "ROOM_JOINED",
            Self::LeftRoom {} => "LEFT_ROOM",
            Self::RoomList { .. } => "ROOM_LIST",
            Self::Message { .. } => "MESSAGE",
            Self::ParticipantList { .. } => "PARTICIPANT_LIST",
        }
    }

    /// Returns `true` for the types a client is allowed to send.
    pub fn is_client_request(&self) -> bool {
        matches!(
            self,
            Self::Auth {}
                | Self::CreateRoom { .. }
                | Self::JoinRoom { .. }
                | Self::RefreshRooms {}
                | Self::Leave {}
                | Self::ChatMessage { .. }
                | Self::Quit {}
        )
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// ISO-8601 UTC send time. Informational only.
    #[serde(default)]
    pub timestamp: String,

    /// The sender's session token; empty on server messages.
    #[serde(default)]
    pub token: String,
}

/// The top-level wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub header: Header,
    pub body: Body,
}

impl Envelope {
    /// Builds a client request stamped with the current time.
    pub fn request(token: impl Into<String>, body: Body) -> Self {
        Self {
            header: Header {
                timestamp: now_timestamp(),
                token: token.into(),
            },
            body,
        }
    }

    /// Builds a server message (empty token) stamped with the current time.
    pub fn server(body: Body) -> Self {
        Self::request(String::new(), body)
    }

    /// Shorthand for a server `ERROR` envelope.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::server(Body::Error {
            message: message.into(),
            code,
        })
    }

    /// Shorthand for a server `MESSAGE` envelope.
    pub fn chat(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::server(Body::Message {
            sender: sender.into(),
            message: message.into(),
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
