//! Client for a remote [`AuthorityServer`](crate::AuthorityServer).
//!
//! Every call opens a fresh TCP connection, writes one command line,
//! reads one response line, and hangs up. The whole exchange is bounded
//! by a timeout (5 s by default).

use std::net::SocketAddr;
use std::time::Duration;

use foyer_protocol::{AuthorityRequest, AuthorityResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::{AuthError, Authenticator, UserInfo};

/// Default bound on one request/response exchange.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// The outcome of a remote login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted.
    Authenticated { token: String, display_name: String },
    /// Wrong username or password.
    Rejected,
}

/// Talks to a remote authority.
#[derive(Debug, Clone)]
pub struct AuthClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl AuthClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Logs in with a username and password.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let request = AuthorityRequest::Auth {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.send(&request).await? {
            AuthorityResponse::Ok {
                token,
                display_name,
            } => Ok(LoginOutcome::Authenticated {
                token,
                display_name,
            }),
            AuthorityResponse::Failed => Ok(LoginOutcome::Rejected),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Creates an account. `Ok(false)` means it wasn't created.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<bool, AuthError> {
        let request = AuthorityRequest::Register {
            username: username.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
        };
        match self.send(&request).await? {
            AuthorityResponse::Registered => Ok(true),
            AuthorityResponse::Exists => Ok(false),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Ends a session at the authority.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let request = AuthorityRequest::Revoke {
            token: token.to_string(),
        };
        match self.send(&request).await? {
            AuthorityResponse::Revoked => Ok(()),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Sends one request and parses the one-line reply.
    pub async fn send(&self, request: &AuthorityRequest) -> Result<AuthorityResponse, AuthError> {
        let line = tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| AuthError::Timeout)??;
        Ok(line.parse()?)
    }

    async fn exchange(&self, request: &AuthorityRequest) -> Result<String, AuthError> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(AuthError::Unreachable)?;

        let mut line = request.to_string();
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(AuthError::Unreachable)?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        let n = reader
            .read_line(&mut response)
            .await
            .map_err(AuthError::Unreachable)?;
        if n == 0 {
            return Err(AuthError::Unreachable(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "authority closed without answering",
            )));
        }
        Ok(response)
    }
}

fn unexpected(request: &AuthorityRequest, response: &AuthorityResponse) -> AuthError {
    // Only the command word: requests can carry passwords.
    let command = request.to_string();
    let command = command.split(' ').next().unwrap_or_default();
    AuthError::UnexpectedResponse(format!("{response} to {command}"))
}

impl Authenticator for AuthClient {
    async fn validate(&self, token: &str) -> Result<bool, AuthError> {
        let request = AuthorityRequest::Validate {
            token: token.to_string(),
        };
        match self.send(&request).await? {
            AuthorityResponse::Valid => Ok(true),
            AuthorityResponse::Invalid => Ok(false),
            other => Err(unexpected(&request, &other)),
        }
    }

    async fn user_info(&self, token: &str) -> Result<Option<UserInfo>, AuthError> {
        let request = AuthorityRequest::GetUser {
            token: token.to_string(),
        };
        match self.send(&request).await? {
            AuthorityResponse::User {
                username,
                display_name,
                roles,
            } => Ok(Some(UserInfo {
                username,
                display_name,
                roles,
            })),
            AuthorityResponse::NotFound => Ok(None),
            other => Err(unexpected(&request, &other)),
        }
    }
}
