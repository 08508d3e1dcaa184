//! Persisted token records.
//!
//! Access and refresh tokens share one record shape. The raw token value
//! is never part of it; records are keyed by the token's signature.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::session::Session;

/// Allow-listed projection of the token request form.
///
/// Only the fields named here are ever persisted. Credentials such as the
/// presented refresh token, client secret or client assertion have no
/// place in this struct, so adding a new secret field to the request form
/// cannot leak it into storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedForm {
    /// Grant type the tokens were issued under.
    pub grant_type: String,

    /// Client ID as sent in the form, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Requested scope string, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Requested audience string, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// An access or refresh token record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    /// Request ID shared by the pair and preserved across rotations.
    pub request_id: String,

    /// Signature derived from the token value; unique per token type.
    pub signature: String,

    /// Inactive tokens are rejected even before they expire.
    pub active: bool,

    /// Client the token was issued to.
    pub client_id: String,

    /// Session the token is bound to.
    pub session_id: String,

    /// When the originating request was made.
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,

    /// Expiry of this record (None = never expires).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,

    /// Scopes the client asked for.
    #[serde(default)]
    pub requested_scopes: Vec<String>,

    /// Scopes actually granted.
    #[serde(default)]
    pub granted_scopes: Vec<String>,

    /// Audiences the client asked for.
    #[serde(default)]
    pub requested_audience: Vec<String>,

    /// Audiences actually granted.
    #[serde(default)]
    pub granted_audience: Vec<String>,

    /// Sanitized request form.
    #[serde(default)]
    pub form: SanitizedForm,
}

impl StoredToken {
    /// Returns `true` if the record has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.map(|exp| now > exp).unwrap_or(false)
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// A token record joined with its session.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSession {
    /// The token record.
    pub token: StoredToken,
    /// The session it is bound to.
    pub session: Session,
}

/// A client assertion JWT ID remembered for replay detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAssertionJti {
    /// The `jti` claim of the assertion.
    pub jti: String,

    /// The assertion's `exp`; the entry is dead after this instant.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the entry is in force.
    pub active: bool,
}

impl ClientAssertionJti {
    /// Creates an active entry.
    #[must_use]
    pub fn new(jti: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            jti: jti.into(),
            expires_at,
            active: true,
        }
    }

    /// Returns `true` if the entry still blocks reuse at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.active && self.expires_at > now
    }
}
