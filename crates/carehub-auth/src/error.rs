//! Token lifecycle error types.
//!
//! Storage-level outcomes (`NotFound`, `InactiveToken`, `Conflict`) are kept
//! distinct from the protocol-level errors so that handlers can decide how
//! each one surfaces to a client, and so that refresh token reuse can be
//! alerted on separately from plain lookup misses.

use std::fmt;

/// Errors produced while issuing, rotating, revoking or looking up tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A lookup by signature, request ID or key found nothing.
    #[error("Not found: {message}")]
    NotFound {
        /// What was being looked up.
        message: String,
    },

    /// The record exists but has been deactivated, or its session is gone.
    #[error("Inactive token: {message}")]
    InactiveToken {
        /// Description of why the token is inactive.
        message: String,
        /// Request ID of the inactive record, when one was found.
        request_id: Option<String>,
    },

    /// A create would have overwritten an existing record.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the colliding key.
        message: String,
    },

    /// The refresh token is invalid, expired, or was issued to another client.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The request is malformed or a token failed its integrity check.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is unknown, inactive, or failed authentication.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The client is not entitled to the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the missing entitlement.
        message: String,
    },

    /// No handler exists for the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The requested scope exceeds what the client may request.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// A client assertion JTI was already used and has not expired.
    #[error("JTI already known: {jti}")]
    JtiKnown {
        /// The replayed JWT ID.
        jti: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// Crypto, deadline, or wrapped storage failure.
    #[error("Server error: {message}")]
    ServerError {
        /// Description of the failure.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `InactiveToken` error without a request ID.
    #[must_use]
    pub fn inactive_token(message: impl Into<String>) -> Self {
        Self::InactiveToken {
            message: message.into(),
            request_id: None,
        }
    }

    /// Creates a new `InactiveToken` error carrying the record's request ID.
    #[must_use]
    pub fn inactive_token_for(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::InactiveToken {
            message: message.into(),
            request_id: Some(request_id.into()),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `JtiKnown` error.
    #[must_use]
    pub fn jti_known(jti: impl Into<String>) -> Self {
        Self::JtiKnown { jti: jti.into() }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `ServerError` error.
    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    /// Wraps any error that is not a client input error as `ServerError`.
    ///
    /// Grant handlers run every store result through this so that storage
    /// failures never leak as 4xx responses.
    #[must_use]
    pub fn into_server_error(self) -> Self {
        if self.is_server_error() {
            match self {
                Self::ServerError { .. } => self,
                other => Self::server_error(other.to_string()),
            }
        } else {
            self
        }
    }

    /// Returns `true` for `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for `InactiveToken`.
    #[must_use]
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::InactiveToken { .. })
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InactiveToken { .. }
                | Self::InvalidGrant { .. }
                | Self::InvalidRequest { .. }
                | Self::InvalidClient { .. }
                | Self::UnauthorizedClient { .. }
                | Self::UnsupportedGrantType { .. }
                | Self::InvalidScope { .. }
                | Self::JtiKnown { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::ServerError { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::Token,
            Self::InactiveToken { .. } => ErrorCategory::Replay,
            Self::Conflict { .. } => ErrorCategory::Infrastructure,
            Self::InvalidGrant { .. } => ErrorCategory::Token,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::InvalidClient { .. } => ErrorCategory::Authentication,
            Self::UnauthorizedClient { .. } => ErrorCategory::Authorization,
            Self::UnsupportedGrantType { .. } => ErrorCategory::Validation,
            Self::InvalidScope { .. } => ErrorCategory::Authorization,
            Self::JtiKnown { .. } => ErrorCategory::Replay,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::ServerError { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    ///
    /// `NotFound` and `InactiveToken` both report `invalid_grant` so a
    /// caller cannot tell a revoked token from one that never existed.
    ///
    /// `JtiKnown` reports `invalid_client` (HTTP 401). This departs from
    /// OAuth servers that answer a replayed client assertion with the
    /// non-standard `jti_known` code and HTTP 400: RFC 6749 only defines
    /// `invalid_client` for failed client authentication.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "invalid_grant",
            Self::InactiveToken { .. } => "invalid_grant",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::JtiKnown { .. } => "invalid_client",
            Self::Conflict { .. }
            | Self::Storage { .. }
            | Self::Configuration { .. }
            | Self::ServerError { .. } => "server_error",
        }
    }
}

/// Categories of token lifecycle errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client authentication failures.
    Authentication,
    /// Entitlement and scope failures.
    Authorization,
    /// Invalid, expired, or unknown tokens.
    Token,
    /// Reuse of a consumed refresh token or a known assertion JTI.
    Replay,
    /// Malformed requests.
    Validation,
    /// Storage failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Replay => write!(f, "replay"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
