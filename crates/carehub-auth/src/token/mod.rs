//! Token services used outside the token endpoint.
//!
//! - [`RevocationService`] - revocation by request ID, RFC 7009 and session
//! - [`ReplayGuard`] - client assertion JTI cache
//! - [`TokenService`] - token issuance for signed-in users

pub mod replay;
pub mod revocation;
pub mod service;

pub use replay::ReplayGuard;
pub use revocation::{RevocationRequest, RevocationService};
pub use service::{AuthTokens, TokenService};
