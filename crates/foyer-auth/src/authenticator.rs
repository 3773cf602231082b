//! The seam between the chat server and whoever issues tokens.
//!
//! The chat server never checks passwords. It only asks two questions
//! about a token the client presents: "is it still good?" and "who does
//! it belong to?". [`Authenticator`] is that question-asking interface,
//! and three things answer it:
//!
//! - [`TokenAuthority`] itself, when the authority runs in-process.
//! - [`AuthClient`](crate::AuthClient), which asks a remote authority
//!   over the line protocol.
//! - `Arc<A>` for any of the above, so one authenticator can be shared.

use std::future::Future;
use std::sync::Arc;

use crate::{AuthError, TokenAuthority, UserInfo, UserStore};

/// Answers token questions for the chat server.
///
/// # Example
///
/// ```rust
/// use foyer_auth::{AuthError, Authenticator, UserInfo};
///
/// /// Trusts exactly one hard-coded token. Only for local experiments.
/// struct SingleToken;
///
/// impl Authenticator for SingleToken {
///     async fn validate(&self, token: &str) -> Result<bool, AuthError> {
///         Ok(token == "letmein")
///     }
///
///     async fn user_info(&self, token: &str) -> Result<Option<UserInfo>, AuthError> {
///         Ok((token == "letmein").then(|| UserInfo {
///             username: "guest".into(),
///             display_name: "Guest".into(),
///             roles: vec![],
///         }))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Whether `token` is currently valid.
    ///
    /// `Err` means the question couldn't be answered (authority down,
    /// garbled reply), which callers must treat as "not valid".
    fn validate(&self, token: &str) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// The identity behind `token`, or `None` if it isn't valid.
    fn user_info(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<UserInfo>, AuthError>> + Send;
}

impl<S: UserStore> Authenticator for TokenAuthority<S> {
    async fn validate(&self, token: &str) -> Result<bool, AuthError> {
        Ok(TokenAuthority::validate(self, token).await)
    }

    async fn user_info(&self, token: &str) -> Result<Option<UserInfo>, AuthError> {
        Ok(self.get_user_info(token).await)
    }
}

impl<A: Authenticator> Authenticator for Arc<A> {
    fn validate(&self, token: &str) -> impl Future<Output = Result<bool, AuthError>> + Send {
        (**self).validate(token)
    }

    fn user_info(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<UserInfo>, AuthError>> + Send {
        (**self).user_info(token)
    }
}
