//! Domain types for the token subsystem.

pub mod client;
pub mod session;
pub mod token;

pub use client::{
    GRANT_INTERNAL, GRANT_INTERNAL_REFRESH_TOKEN, OAuthClient, hash_client_secret,
    verify_client_secret,
};
pub use session::{Session, TokenType};
pub use token::{ClientAssertionJti, SanitizedForm, StoredToken, TokenSession};
