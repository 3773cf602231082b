//! Runs the token authority and the chat server in one process.
//!
//! The chat server reaches the authority over its line protocol, exactly
//! as it would if the two ran on different hosts.
//!
//! Environment:
//! - `FOYER_CHAT_ADDR`: chat listener (default `127.0.0.1:8080`)
//! - `FOYER_AUTH_ADDR`: authority listener (default `127.0.0.1:8081`)
//! - `FOYER_USERS_FILE`: account store (default `foyer-users.json`)
//! - `RUST_LOG`: log filter (default `info`)

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use foyer::prelude::*;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

struct Settings {
    chat_addr: String,
    authority: AuthorityConfig,
    auth: AuthConfig,
    users_file: PathBuf,
}

impl Settings {
    fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok();
        let defaults = AuthorityConfig::default();
        Self {
            chat_addr: env("FOYER_CHAT_ADDR").unwrap_or_else(|| ServerConfig::default().bind_addr),
            authority: AuthorityConfig {
                bind_addr: env("FOYER_AUTH_ADDR").unwrap_or(defaults.bind_addr.clone()),
                ..defaults
            },
            auth: AuthConfig::default(),
            users_file: env("FOYER_USERS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("foyer-users.json")),
        }
    }
}

/// Starts the authority in the background and builds a chat server that
/// asks it about tokens. Returns the chat server and the authority's
/// address.
async fn launch(
    settings: &Settings,
) -> Result<(FoyerServer<TcpTransport, AuthClient>, SocketAddr), BoxError> {
    let store = JsonFileUserStore::open(&settings.users_file).await?;
    let authority = Arc::new(TokenAuthority::new(store, settings.auth.clone()));
    TokenAuthority::spawn_cleanup(Arc::clone(&authority), settings.authority.cleanup_interval);

    let authority_server = AuthorityServer::bind(&settings.authority, authority).await?;
    let authority_addr = authority_server.local_addr()?;
    tracing::info!(
        addr = %authority_addr,
        users = %settings.users_file.display(),
        "authority listening"
    );
    tokio::spawn(async move {
        if let Err(e) = authority_server.run().await {
            tracing::error!(error = %e, "authority stopped");
        }
    });

    let chat = FoyerServerBuilder::new()
        .bind(&settings.chat_addr)
        .build(AuthClient::new(authority_addr))
        .await?;
    tracing::info!(addr = %chat.local_addr()?, "chat server listening");
    Ok((chat, authority_addr))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (chat, _) = launch(&Settings::from_env()).await?;
    chat.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use foyer_auth::{HashingConfig, LoginOutcome};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    use super::*;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            chat_addr: "127.0.0.1:0".into(),
            authority: AuthorityConfig {
                bind_addr: "127.0.0.1:0".into(),
                ..AuthorityConfig::default()
            },
            auth: AuthConfig {
                hashing: HashingConfig::minimal(),
                ..AuthConfig::default()
            },
            users_file: dir.path().join("users.json"),
        }
    }

    async fn next_body(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Body {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        let envelope: Envelope = serde_json::from_str(line.trim_end()).unwrap();
        envelope.body
    }

    #[tokio::test]
    async fn test_register_login_and_enter_foyer() {
        let dir = tempfile::tempdir().unwrap();
        let (chat, authority_addr) = launch(&settings(&dir)).await.unwrap();
        let chat_addr = chat.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = chat.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let auth = AuthClient::new(authority_addr);
        assert!(auth.register("alice", "pw", "Alice Liddell").await.unwrap());
        let token = match auth.authenticate("alice", "pw").await.unwrap() {
            LoginOutcome::Authenticated {
                token,
                display_name,
            } => {
                assert_eq!(display_name, "Alice Liddell");
                token
            }
            LoginOutcome::Rejected => panic!("login rejected"),
        };

        let (read, mut write) = TcpStream::connect(chat_addr).await.unwrap().into_split();
        let mut reader = BufReader::new(read);
        let send = |body: Body| {
            let mut line = serde_json::to_string(&Envelope::request(token.clone(), body)).unwrap();
            line.push('\n');
            line
        };

        write.write_all(send(Body::Auth {}).as_bytes()).await.unwrap();
        assert!(matches!(
            next_body(&mut reader).await,
            Body::RoomList { rooms, .. } if rooms == ["General"]
        ));

        let create = send(Body::CreateRoom {
            room_name: "tea party".into(),
        });
        write.write_all(create.as_bytes()).await.unwrap();
        assert_eq!(
            next_body(&mut reader).await,
            Body::RoomJoined {
                room_name: "tea party".into()
            }
        );
        assert!(dir.path().join("users.json").exists());
    }
}
