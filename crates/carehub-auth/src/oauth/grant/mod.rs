//! Grant type handlers.
//!
//! Each supported grant is one [`GrantKind`] variant mapped to one
//! [`TokenEndpointHandler`]. Exactly one handler runs per request.

pub mod internal;
pub mod internal_refresh;

use std::fmt;

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::request::AccessRequest;
use crate::oauth::token::TokenResponse;
use crate::types::{GRANT_INTERNAL, GRANT_INTERNAL_REFRESH_TOKEN};

pub use internal::InternalGrantHandler;
pub use internal_refresh::InternalRefreshHandler;

/// The grant types this server issues tokens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantKind {
    /// `internal`: tokens for a user the application already authenticated.
    Internal,
    /// `internal_refresh_token`: rotating refresh of an internal pair.
    InternalRefresh,
}

impl GrantKind {
    /// Maps a `grant_type` form value to a grant kind.
    #[must_use]
    pub fn from_grant_type(grant_type: &str) -> Option<Self> {
        match grant_type {
            GRANT_INTERNAL => Some(Self::Internal),
            GRANT_INTERNAL_REFRESH_TOKEN => Some(Self::InternalRefresh),
            _ => None,
        }
    }

    /// The `grant_type` string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => GRANT_INTERNAL,
            Self::InternalRefresh => GRANT_INTERNAL_REFRESH_TOKEN,
        }
    }

    /// Whether the provider may skip client authentication.
    ///
    /// Only the internal grant does: the caller has already authenticated
    /// the user in-process.
    #[must_use]
    pub fn can_skip_client_auth(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-phase token endpoint handler.
///
/// `handle_token_endpoint_request` validates and fills in the request;
/// `populate_token_endpoint_response` mints and persists tokens. Nothing is
/// written to storage before the populate phase.
#[async_trait]
pub trait TokenEndpointHandler: Send + Sync {
    /// Validates the request and sets session, scopes and audience.
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> AuthResult<()>;

    /// Issues the tokens and builds the response.
    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
    ) -> AuthResult<TokenResponse>;
}
