//! User records and the public identity derived from a token.

use serde::{Deserialize, Serialize};

/// Role given to every self-registered account.
pub const DEFAULT_ROLE: &str = "user";

/// A registered account, as persisted by a [`UserStore`](crate::UserStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique login name. Never empty, never contains whitespace.
    pub username: String,
    /// Argon2id PHC string. The plaintext password is never stored.
    pub password_hash: String,
    /// Name shown to other chat participants.
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Creates a user with the default role.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            display_name: display_name.into(),
            roles: vec![DEFAULT_ROLE.to_string()],
        }
    }
}

/// Who a valid token belongs to. This is what the chat server learns
/// during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// Checks that a username can travel in a space-delimited command.
pub(crate) fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && !username.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new_has_default_role() {
        let user = User::new("alice", "$argon2id$...", "Alice");
        assert_eq!(user.roles, vec!["user"]);
    }

    #[test]
    fn test_user_deserialize_without_roles() {
        let raw = r#"{"username":"a","password_hash":"h","display_name":"A"}"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_is_valid_username() {
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("alice smith"));
        assert!(!is_valid_username("tab\there"));
    }
}
