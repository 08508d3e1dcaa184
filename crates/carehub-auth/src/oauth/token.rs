//! Token endpoint types.
//!
//! This module provides the request, response and error shapes of the
//! token endpoint. Parsing them from HTTP is the caller's job.
//!
//! # Supported Grant Types
//!
//! - `internal` - First-party token issuance for a signed-in user
//! - `internal_refresh_token` - Rotating refresh of an internal token pair

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Token request form parameters.
///
/// Only [`SanitizedForm`](crate::types::SanitizedForm) fields ever reach
/// storage; everything else here is used during the request only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type. Required.
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Client ID (for public clients or client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (for client_secret_post authentication).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Refresh token (for internal_refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scopes (space-separated).
    #[serde(default)]
    pub scope: Option<String>,

    /// Requested audiences (space-separated).
    #[serde(default)]
    pub audience: Option<String>,
}

impl TokenRequest {
    /// Creates a form for the given grant type.
    #[must_use]
    pub fn new(grant_type: impl Into<String>) -> Self {
        Self {
            grant_type: Some(grant_type.into()),
            ..Self::default()
        }
    }

    /// Sets the client ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Sets the requested scope string.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the requested audience string.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Requested scopes, split on whitespace.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        split_list(self.scope.as_deref())
    }

    /// Requested audiences, split on whitespace.
    #[must_use]
    pub fn audiences(&self) -> Vec<String> {
        split_list(self.audience.as_deref())
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Client credentials taken from an `Authorization: Basic` header.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl ClientCredentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Successful token response.
///
/// ```json
/// {
///   "access_token": "Wb1...Xk.b7F...q9",
///   "token_type": "bearer",
///   "expires_in": 3600,
///   "refresh_token": "pL0...Qw.Zz1...Aa",
///   "scope": "profile"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The opaque access token.
    pub access_token: String,

    /// Token type, always "bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

impl TokenResponse {
    /// Creates a bearer token response.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scopes: &[String]) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: None,
            scope: scopes.join(" "),
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Token error response.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "The token is invalid, expired or revoked"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Description shared by unknown and inactive tokens.
pub(crate) const UNUSABLE_TOKEN_DESCRIPTION: &str = "The token is invalid, expired or revoked";

impl TokenError {
    /// Creates a new token error with description.
    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }

    /// HTTP status this error is sent with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.error.http_status()
    }
}

impl From<&AuthError> for TokenError {
    fn from(err: &AuthError) -> Self {
        use AuthError as E;
        match err {
            E::NotFound { .. } | E::InactiveToken { .. } => {
                Self::with_description(TokenErrorCode::InvalidGrant, UNUSABLE_TOKEN_DESCRIPTION)
            }
            E::InvalidGrant { message } => {
                Self::with_description(TokenErrorCode::InvalidGrant, message)
            }
            E::InvalidRequest { message } => {
                Self::with_description(TokenErrorCode::InvalidRequest, message)
            }
            E::InvalidClient { message } => {
                Self::with_description(TokenErrorCode::InvalidClient, message)
            }
            E::JtiKnown { .. } => Self::with_description(
                TokenErrorCode::InvalidClient,
                "The client assertion has already been used",
            ),
            E::UnauthorizedClient { message } => {
                Self::with_description(TokenErrorCode::UnauthorizedClient, message)
            }
            E::UnsupportedGrantType { grant_type } => Self::with_description(
                TokenErrorCode::UnsupportedGrantType,
                format!("Grant type '{grant_type}' is not supported"),
            ),
            E::InvalidScope { message } => {
                Self::with_description(TokenErrorCode::InvalidScope, message)
            }
            E::Conflict { .. } | E::Storage { .. } | E::Configuration { .. } | E::ServerError { .. } => {
                Self::with_description(
                    TokenErrorCode::ServerError,
                    "The authorization server encountered an unexpected condition",
                )
            }
        }
    }
}

impl From<AuthError> for TokenError {
    fn from(err: AuthError) -> Self {
        Self::from(&err)
    }
}

/// OAuth 2.0 token error codes.
///
/// Defined in RFC 6749 Section 5.2, plus `server_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// The request is missing a required parameter or is otherwise
    /// malformed.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// The refresh token is invalid, expired, revoked, or was issued to
    /// another client.
    InvalidGrant,

    /// The client is not authorized to use this grant type.
    UnauthorizedClient,

    /// The grant type is not supported.
    UnsupportedGrantType,

    /// The requested scope exceeds what the client may request.
    InvalidScope,

    /// Storage, crypto or deadline failure.
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient | Self::UnauthorizedClient => 401,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnsupportedGrantType
            | Self::InvalidScope => 400,
            Self::ServerError => 500,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
