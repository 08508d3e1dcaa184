//! Session shared by an access/refresh token pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of token a session expiry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
}

impl TokenType {
    /// Returns the RFC 7009 token type hint string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subject and claims a token pair was issued for.
///
/// Upserted by ID whenever a token referencing it is stored. Its lifetime
/// is that of the longest-lived token pointing at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,

    /// Client the session was created for.
    pub client_id: String,

    /// Subject (user identifier) the tokens act on behalf of.
    pub subject: String,

    /// Display username, used for introspection only.
    #[serde(default)]
    pub username: String,

    /// Additional claims carried with the session.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    /// Expiry per token type.
    #[serde(default)]
    pub expires_at: HashMap<TokenType, OffsetDateTime>,

    /// When set, every token bound to this session is invalid.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl Session {
    /// Creates a session with a fresh ID.
    #[must_use]
    pub fn new(client_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            subject: subject.into(),
            username: String::new(),
            extra: serde_json::Map::new(),
            expires_at: HashMap::new(),
            revoked_at: None,
        }
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Adds an extra claim.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Sets the expiry of one token type, keeping the others.
    pub fn set_expires_at(&mut self, token_type: TokenType, at: OffsetDateTime) {
        self.expires_at.insert(token_type, at);
    }

    /// Returns the expiry of a token type, if set.
    #[must_use]
    pub fn get_expires_at(&self, token_type: TokenType) -> Option<OffsetDateTime> {
        self.expires_at.get(&token_type).copied()
    }

    /// Returns `true` if the session has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
