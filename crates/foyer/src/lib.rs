//! # Foyer
//!
//! A multi-room chat server with token authentication.
//!
//! Clients present a token issued by a [`TokenAuthority`](foyer_auth::TokenAuthority),
//! land in the *foyer* where they can list, create, and join rooms, and
//! then chat with everyone in the same room. Each room keeps a bounded
//! history that is replayed to late joiners.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use foyer::prelude::*;
//!
//! # async fn run() -> Result<(), FoyerError> {
//! let authority = Arc::new(TokenAuthority::new(
//!     InMemoryUserStore::new(),
//!     AuthConfig::default(),
//! ));
//! let server = FoyerServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(authority)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use config::ServerConfig;
pub use error::FoyerError;
pub use registry::{ClientRegistry, ClientSession};
pub use server::{FoyerServer, FoyerServerBuilder};

/// Everything needed to stand up a server and talk to it.
pub mod prelude {
    pub use crate::{ClientRegistry, FoyerError, FoyerServer, FoyerServerBuilder, ServerConfig};
    pub use foyer_auth::{
        AuthClient, AuthConfig, Authenticator, AuthorityConfig, AuthorityServer,
        InMemoryUserStore, JsonFileUserStore, TokenAuthority, UserInfo, UserStore,
    };
    pub use foyer_protocol::{Body, Codec, Envelope, ErrorCode, JsonCodec};
    pub use foyer_room::RoomConfig;
    pub use foyer_transport::{TcpTransport, Transport};
}
