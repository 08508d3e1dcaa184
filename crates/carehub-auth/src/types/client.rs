//! OAuth 2.0 client registration and secret hashing.

use std::collections::BTreeSet;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};

/// Grant type string of the trusted first-party grant.
pub const GRANT_INTERNAL: &str = "internal";

/// Grant type string of the rotating refresh grant.
pub const GRANT_INTERNAL_REFRESH_TOKEN: &str = "internal_refresh_token";

/// OAuth 2.0 client registration.
///
/// Managed outside this crate; the token subsystem only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClient {
    /// Unique client identifier.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Argon2 PHC hash of the client secret (None for public clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Grant types this client is entitled to use.
    #[serde(default)]
    pub grant_types: BTreeSet<String>,

    /// Scopes this client may request. Empty means any scope.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Audiences this client may request.
    #[serde(default)]
    pub audience: Vec<String>,

    /// Public clients have no secret and skip secret verification.
    #[serde(default)]
    pub public: bool,

    /// Inactive clients cannot obtain tokens.
    pub active: bool,
}

impl OAuthClient {
    /// Creates an active confidential client with no grants.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            secret_hash: None,
            grant_types: BTreeSet::new(),
            scopes: Vec::new(),
            audience: Vec::new(),
            public: false,
            active: true,
        }
    }

    /// Adds a grant type entitlement.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_types.insert(grant_type.into());
        self
    }

    /// Sets the allowed scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the allowed audiences.
    #[must_use]
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the stored secret hash.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.secret_hash = Some(hash.into());
        self
    }

    /// Marks the client as public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Returns `true` if the client declares the grant type.
    #[must_use]
    pub fn has_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.contains(grant_type)
    }

    /// Checks if the given scope is allowed for this client.
    ///
    /// An empty scopes list means all scopes are allowed.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }

    /// Checks if the given audience is allowed for this client.
    #[must_use]
    pub fn is_audience_allowed(&self, audience: &str) -> bool {
        self.audience.iter().any(|a| a == audience)
    }

    /// Verifies a presented secret against the stored hash.
    ///
    /// Returns `false` when no hash is stored or the hash is malformed.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        match self.secret_hash.as_deref() {
            Some(hash) => verify_client_secret(secret, hash).unwrap_or(false),
            None => false,
        }
    }
}

/// Hash a client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_client_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a client secret against a stored Argon2 hash.
///
/// # Errors
///
/// Returns `Err` only if the hash format is invalid.
pub fn verify_client_secret(
    secret: &str,
    hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(secret.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}
