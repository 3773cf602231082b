//! Error types for the authentication layer.

use foyer_protocol::ProtocolError;
use foyer_transport::TransportError;

/// Errors that can occur while issuing, checking, or storing credentials.
///
/// A rejected password or an unknown token is *not* an error: those are
/// ordinary answers (`Token::invalid()`, `false`, `None`). These variants
/// are for the machinery failing.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The username is empty or contains whitespace. Usernames travel in
    /// space-delimited authority commands, so neither can be allowed.
    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    /// Hashing or verifying a password failed (bad parameters, corrupt
    /// stored hash).
    #[error("password hashing failed: {0}")]
    PasswordHashing(String),

    /// Reading or writing the user file failed.
    #[error("user store I/O failed: {0}")]
    Storage(#[source] std::io::Error),

    /// The user file exists but isn't a valid user document.
    #[error("user store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The remote authority couldn't be reached or dropped the connection.
    #[error("authority unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    /// The remote authority didn't answer within the client's timeout.
    #[error("authority timed out")]
    Timeout,

    /// The remote authority answered with something unexpected for the
    /// command that was sent.
    #[error("unexpected authority response: {0}")]
    UnexpectedResponse(String),

    /// A line on the authority protocol didn't parse.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The authority server's listener failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: AuthError = ProtocolError::InvalidMessage("HELLO".into()).into();
        assert!(matches!(err, AuthError::Protocol(_)));
        assert!(err.to_string().contains("HELLO"));
    }

    #[test]
    fn test_invalid_username_display_quotes_value() {
        let err = AuthError::InvalidUsername("a b".into());
        assert_eq!(err.to_string(), "invalid username: \"a b\"");
    }
}
