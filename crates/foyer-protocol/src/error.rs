//! Error types for the protocol layer.
//!
//! Each crate in Foyer defines its own error enum. A `ProtocolError`
//! always means the bytes or the line on the wire were wrong, never that
//! the network or a room misbehaved.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing `header`/`body`, an unknown
    /// `type`, or a `data` object missing required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level.
    ///
    /// Used for authority command lines that don't parse and for
    /// envelopes that decode fine but break protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
