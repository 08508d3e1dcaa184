//! Storage traits for the token subsystem.
//!
//! This module defines storage interfaces for:
//!
//! - Access and refresh tokens
//! - Sessions shared by a token pair
//! - OAuth client registrations
//! - Client assertion JTIs
//!
//! [`TokenStore`] bundles all of them. Any type implementing the five
//! traits is a `TokenStore`.

pub mod access_token;
pub mod client;
#[cfg(test)]
pub(crate) mod failing;
pub mod jti;
pub mod memory;
pub mod refresh_token;
pub mod session;

pub use access_token::AccessTokenStorage;
pub use client::ClientStorage;
pub use jti::JtiStorage;
pub use memory::InMemoryTokenStore;
pub use refresh_token::{RefreshRotation, RefreshTokenStorage};
pub use session::SessionStorage;

/// Everything the grant handlers and services need from persistence.
pub trait TokenStore:
    AccessTokenStorage + RefreshTokenStorage + SessionStorage + ClientStorage + JtiStorage
{
}

impl<T> TokenStore for T where
    T: AccessTokenStorage + RefreshTokenStorage + SessionStorage + ClientStorage + JtiStorage
{
}
