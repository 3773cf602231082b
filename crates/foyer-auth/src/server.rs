//! The authority's network front end.
//!
//! Listens on a newline-framed TCP transport and answers exactly one
//! authority command per connection:
//!
//! ```text
//! client ──"VALIDATE 9f2c...\n"──→ AuthorityServer ──"VALID\n"──→ client
//!                                                    (then close)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use foyer_protocol::{AuthorityRequest, AuthorityResponse};
use foyer_transport::{Connection, TcpTransport, Transport};

use crate::{AuthError, AuthorityConfig, TokenAuthority, UserStore};

/// Longest request line the authority will read.
const MAX_REQUEST_BYTES: usize = 4096;

/// Serves the authority line protocol for a [`TokenAuthority`].
pub struct AuthorityServer<S: UserStore> {
    transport: TcpTransport,
    authority: Arc<TokenAuthority<S>>,
    recv_timeout: Duration,
}

impl<S: UserStore> AuthorityServer<S> {
    /// Binds the listener described by `config`.
    pub async fn bind(
        config: &AuthorityConfig,
        authority: Arc<TokenAuthority<S>>,
    ) -> Result<Self, AuthError> {
        let transport =
            TcpTransport::bind(&config.bind_addr).await?.with_max_frame_bytes(MAX_REQUEST_BYTES);
        Ok(Self {
            transport,
            authority,
            recv_timeout: config.recv_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections until the process exits, handling each on its
    /// own task.
    pub async fn run(mut self) -> Result<(), AuthError> {
        tracing::info!("authority server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let authority = Arc::clone(&self.authority);
                    let recv_timeout = self.recv_timeout;
                    tokio::spawn(async move {
                        handle_request(conn, authority, recv_timeout).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "authority accept failed");
                }
            }
        }
    }
}

async fn handle_request<S: UserStore, C: Connection>(
    conn: C,
    authority: Arc<TokenAuthority<S>>,
    recv_timeout: Duration,
) {
    let id = conn.id();

    let line = match tokio::time::timeout(recv_timeout, conn.recv()).await {
        Ok(Ok(Some(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Ok(None)) => {
            tracing::debug!(%id, "authority peer closed without a request");
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(%id, error = %e, "authority read failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%id, "authority peer sent nothing in time");
            let _ = conn.close().await;
            return;
        }
    };

    let response = match line.parse::<AuthorityRequest>() {
        Ok(request) => answer(&authority, request).await,
        Err(e) => {
            tracing::debug!(%id, error = %e, "unknown authority command");
            AuthorityResponse::UnknownCommand
        }
    };

    if let Err(e) = conn.send(response.to_string().as_bytes()).await {
        tracing::debug!(%id, error = %e, "authority reply failed");
    }
    let _ = conn.close().await;
}

/// Runs one request against the authority.
///
/// Store or hashing failures degrade to the negative answer for that
/// command; the peer only ever sees protocol responses.
pub(crate) async fn answer<S: UserStore>(
    authority: &TokenAuthority<S>,
    request: AuthorityRequest,
) -> AuthorityResponse {
    match request {
        AuthorityRequest::Auth { username, password } => {
            match authority.authenticate(&username, &password).await {
                Ok(token) if token.is_valid => AuthorityResponse::Ok {
                    token: token.value,
                    display_name: token.display_name,
                },
                Ok(_) => AuthorityResponse::Failed,
                Err(e) => {
                    tracing::warn!(%username, error = %e, "authentication errored");
                    AuthorityResponse::Failed
                }
            }
        }
        AuthorityRequest::Validate { token } => {
            if authority.validate(&token).await {
                AuthorityResponse::Valid
            } else {
                AuthorityResponse::Invalid
            }
        }
        AuthorityRequest::GetUser { token } => match authority.get_user_info(&token).await {
            Some(info) => AuthorityResponse::User {
                username: info.username,
                display_name: info.display_name,
                roles: info.roles,
            },
            None => AuthorityResponse::NotFound,
        },
        AuthorityRequest::Register {
            username,
            password,
            display_name,
        } => match authority.register_user(&username, &password, &display_name).await {
            Ok(true) => AuthorityResponse::Registered,
            Ok(false) => AuthorityResponse::Exists,
            Err(e) => {
                tracing::warn!(%username, error = %e, "registration rejected");
                AuthorityResponse::Exists
            }
        },
        AuthorityRequest::Revoke { token } => {
            authority.revoke(&token).await;
            AuthorityResponse::Revoked
        }
    }
}
