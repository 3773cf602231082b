//! Wire protocols for Foyer.
//!
//! Two conversations happen in a Foyer deployment, and this crate defines
//! the language of both:
//!
//! - **Chat envelopes** ([`Envelope`], [`Header`], [`Body`], [`ErrorCode`])
//!   travel between chat clients and the chat server, one JSON document
//!   per line.
//! - **Authority lines** ([`AuthorityRequest`], [`AuthorityResponse`])
//!   travel between anyone who needs a token checked and the credential
//!   authority.
//!
//! The [`Codec`] trait (with [`JsonCodec`]) turns envelopes into bytes and
//! back. Errors are reported as [`ProtocolError`].
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames of bytes) and the
//! server (sessions and rooms). It knows nothing about connections or
//! rooms; it only knows what a valid message looks like.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Server (session state machine)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod authority;
mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use authority::{AuthorityRequest, AuthorityResponse, NO_ROLES};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{now_timestamp, Body, Envelope, ErrorCode, Header, TIMESTAMP_FORMAT};
