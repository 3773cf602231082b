//! Authentication for Foyer.
//!
//! This crate answers "who is this client?" for the chat server:
//!
//! 1. **Accounts** live in a [`UserStore`] ([`InMemoryUserStore`],
//!    [`JsonFileUserStore`]) with Argon2id password hashes.
//! 2. **Tokens** are issued by the [`TokenAuthority`] on a successful
//!    login and expire after a configurable TTL.
//! 3. **The chat server** only sees the [`Authenticator`] trait, answered
//!    in-process by the authority or remotely via [`AuthClient`] talking
//!    to an [`AuthorityServer`].
//! 4. **Per-message checks** go through a [`TokenValidationCache`] so
//!    chat lines don't each cost a round trip to the authority.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)     ← checks the token on every client message
//!     ↕
//! Auth (this crate)  ← issues, validates, caches tokens
//!     ↕
//! Protocol/Transport (below) ← authority line protocol over TCP
//! ```

mod authenticator;
mod authority;
mod cache;
mod client;
mod config;
mod error;
mod file_store;
mod password;
mod server;
mod store;
mod token;
mod user;

pub use authenticator::Authenticator;
pub use authority::TokenAuthority;
pub use cache::{TokenValidationCache, DEFAULT_CACHE_TTL};
pub use client::{AuthClient, LoginOutcome, DEFAULT_CLIENT_TIMEOUT};
pub use config::{AuthConfig, AuthorityConfig, HashingConfig, DEFAULT_TOKEN_TTL};
pub use error::AuthError;
pub use file_store::JsonFileUserStore;
pub use password::{hash_password, verify_password};
pub use server::AuthorityServer;
pub use store::{InMemoryUserStore, UserStore};
pub use token::Token;
pub use user::{User, UserInfo, DEFAULT_ROLE};
