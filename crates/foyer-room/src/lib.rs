//! Chat rooms for Foyer.
//!
//! # Key types
//!
//! - [`ChatRoom`]: members, bounded history, broadcast
//! - [`RoomDirectory`]: the server-wide name → room map
//! - [`RoomConfig`]: history size, name limits, empty-room policy
//! - [`Frame`] / [`ClientSender`]: encoded envelopes and the per-connection
//!   queues rooms push them into

mod config;
mod directory;
mod error;
mod room;

pub use config::RoomConfig;
pub use directory::{RoomDirectory, RoomSummary};
pub use error::RoomError;
pub use room::{
    server_notice, ChatRoom, ClientSender, Frame, Member, HISTORY_END, HISTORY_START,
    SERVER_SENDER,
};
