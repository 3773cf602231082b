//! The authority line protocol.
//!
//! The credential authority speaks a tiny text protocol: one
//! space-delimited request line per connection, one response line back.
//!
//! ```text
//! AUTH alice s3cret            -> OK 9f2c... Alice Liddell
//! VALIDATE 9f2c...             -> VALID
//! GETUSER 9f2c...              -> USER alice Alice Liddell user;admin
//! REGISTER bob pw Bob Builder  -> REGISTERED
//! REVOKE 9f2c...               -> REVOKED
//! ```
//!
//! Display names may contain spaces, so they always take "the rest of the
//! line". In a `USER` response the roles come after the *last* space, and
//! an empty role list is written as `-` so that split is never ambiguous.

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

/// Placeholder for an empty role list in a `USER` response.
pub const NO_ROLES: &str = "-";

/// Splits off the next whitespace-delimited word.
///
/// Returns `(word, rest)`; `rest` starts at the whitespace after the word
/// (or is empty). Leading whitespace is skipped.
fn next_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], &s[end..]),
        None => (s, ""),
    }
}

/// Everything after the consumed words, without surrounding whitespace.
fn rest_of_line(s: &str) -> &str {
    s.trim()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A command sent to the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityRequest {
    /// `AUTH <username> <password>`
    Auth { username: String, password: String },
    /// `VALIDATE <token>`
    Validate { token: String },
    /// `GETUSER <token>`
    GetUser { token: String },
    /// `REGISTER <username> <password> <display name...>`
    Register {
        username: String,
        password: String,
        display_name: String,
    },
    /// `REVOKE <token>`
    Revoke { token: String },
}

impl FromStr for AuthorityRequest {
    type Err = ProtocolError;

    /// Parses one request line.
    ///
    /// Missing arguments parse as empty strings; the authority then answers
    /// `FAILED`, `INVALID` or `NOTFOUND` as it would for any bad value. An
    /// unknown command word is an error, answered with `UNKNOWN_COMMAND`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (command, rest) = next_word(line);
        match command {
            "AUTH" => {
                let (username, rest) = next_word(rest);
                let (password, _) = next_word(rest);
                Ok(Self::Auth {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            "VALIDATE" => Ok(Self::Validate {
                token: next_word(rest).0.to_string(),
            }),
            "GETUSER" => Ok(Self::GetUser {
                token: next_word(rest).0.to_string(),
            }),
            "REGISTER" => {
                let (username, rest) = next_word(rest);
                let (password, rest) = next_word(rest);
                Ok(Self::Register {
                    username: username.to_string(),
                    password: password.to_string(),
                    display_name: rest_of_line(rest).to_string(),
                })
            }
            "REVOKE" => Ok(Self::Revoke {
                token: next_word(rest).0.to_string(),
            }),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown authority command: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for AuthorityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { username, password } => write!(f, "AUTH {username} {password}"),
            Self::Validate { token } => write!(f, "VALIDATE {token}"),
            Self::GetUser { token } => write!(f, "GETUSER {token}"),
            Self::Register {
                username,
                password,
                display_name,
            } => write!(f, "REGISTER {username} {password} {display_name}"),
            Self::Revoke { token } => write!(f, "REVOKE {token}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// The authority's one-line answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityResponse {
    /// `OK <token> <display name...>`
    Ok { token: String, display_name: String },
    /// `FAILED`
    Failed,
    /// `VALID`
    Valid,
    /// `INVALID`
    Invalid,
    /// `USER <username> <display name...> <role;role|->`
    User {
        username: String,
        display_name: String,
        roles: Vec<String>,
    },
    /// `NOTFOUND`
    NotFound,
    /// `REGISTERED`
    Registered,
    /// `EXISTS`
    Exists,
    /// `REVOKED`
    Revoked,
    /// `UNKNOWN_COMMAND`
    UnknownCommand,
}

impl FromStr for AuthorityResponse {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (status, rest) = next_word(line);
        let bare = |response: Self| {
            if rest.trim().is_empty() {
                Ok(response)
            } else {
                Err(ProtocolError::InvalidMessage(format!(
                    "unexpected arguments after {status}"
                )))
            }
        };

        match status {
            "OK" => {
                let (token, rest) = next_word(rest);
                if token.is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "OK without a token".into(),
                    ));
                }
                Ok(Self::Ok {
                    token: token.to_string(),
                    display_name: rest_of_line(rest).to_string(),
                })
            }
            "USER" => {
                let (username, rest) = next_word(rest);
                let rest = rest_of_line(rest);
                let (display_name, roles) = match rest.rfind(' ') {
                    Some(split) => (&rest[..split], &rest[split + 1..]),
                    None => (rest, NO_ROLES),
                };
                if username.is_empty() {
                    return Err(ProtocolError::InvalidMessage(
                        "USER without a username".into(),
                    ));
                }
                Ok(Self::User {
                    username: username.to_string(),
                    display_name: display_name.trim_end().to_string(),
                    roles: parse_roles(roles),
                })
            }
            "FAILED" => bare(Self::Failed),
            "VALID" => bare(Self::Valid),
            "INVALID" => bare(Self::Invalid),
            "NOTFOUND" => bare(Self::NotFound),
            "REGISTERED" => bare(Self::Registered),
            "EXISTS" => bare(Self::Exists),
            "REVOKED" => bare(Self::Revoked),
            "UNKNOWN_COMMAND" => bare(Self::UnknownCommand),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown authority response: {other:?}"
            ))),
        }
    }
}

fn parse_roles(field: &str) -> Vec<String> {
    if field == NO_ROLES {
        return Vec::new();
    }
    field
        .split(';')
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for AuthorityResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok {
                token,
                display_name,
            } => write!(f, "OK {token} {display_name}"),
            Self::Failed => f.write_str("FAILED"),
            Self::Valid => f.write_str("VALID"),
            Self::Invalid => f.write_str("INVALID"),
            Self::User {
                username,
                display_name,
                roles,
            } => {
                let roles = if roles.is_empty() {
                    NO_ROLES.to_string()
                } else {
                    roles.join(";")
                };
                write!(f, "USER {username} {display_name} {roles}")
            }
            Self::NotFound => f.write_str("NOTFOUND"),
            Self::Registered => f.write_str("REGISTERED"),
            Self::Exists => f.write_str("EXISTS"),
            Self::Revoked => f.write_str("REVOKED"),
            Self::UnknownCommand => f.write_str("UNKNOWN_COMMAND"),
        }
    }
}
