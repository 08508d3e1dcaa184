//! # carehub-auth
//!
//! OAuth 2.0 token lifecycle for CareHub.
//!
//! This crate provides:
//! - Opaque HMAC-signed access and refresh tokens
//! - The `internal` grant for users the application has already signed in
//! - The rotating `internal_refresh_token` grant
//! - Revocation by request ID, by session and per RFC 7009
//! - A JTI cache against client assertion replay
//!
//! ## Overview
//!
//! A token request goes to the [`Provider`](oauth::Provider), which
//! authenticates the client and dispatches to exactly one grant handler.
//! Handlers read and write a [`TokenStore`](storage::TokenStore). The store
//! is the only shared mutable state; refresh rotation is a single store
//! transaction, so a refresh token can be exchanged at most once.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, signing secret and internal client
//! - [`oauth`] - Token endpoint provider, grant handlers and token strategy
//! - [`token`] - Revocation, replay guard and in-process token service
//! - [`storage`] - Storage traits and the in-memory store
//! - [`types`] - Clients, sessions and token records

pub mod config;
pub mod error;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use oauth::{Provider, TokenError, TokenRequest, TokenResponse};
pub use storage::{InMemoryTokenStore, TokenStore};
pub use token::{AuthTokens, ReplayGuard, RevocationService, TokenService};

/// Type alias for token lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use carehub_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError, InternalClientConfig, Lifespan, Secret};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::oauth::{
        AccessRequest, ClientCredentials, GrantKind, Provider, TokenError, TokenErrorCode,
        TokenRequest, TokenResponse,
    };
    pub use crate::storage::{
        AccessTokenStorage, ClientStorage, InMemoryTokenStore, JtiStorage, RefreshTokenStorage,
        SessionStorage, TokenStore,
    };
    pub use crate::token::{
        AuthTokens, ReplayGuard, RevocationRequest, RevocationService, TokenService,
    };
    pub use crate::types::{OAuthClient, Session, StoredToken, TokenSession, TokenType};
}
