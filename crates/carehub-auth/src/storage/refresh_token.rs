//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored by signature only
//! - A refresh token is single use: rotation deactivates it in the same
//!   critical section that makes its successor visible
//! - Revocation by request ID covers the whole rotation chain

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::{Session, StoredToken, TokenSession};

/// Everything a store needs to swap a refresh token for its successors.
#[derive(Debug, Clone)]
pub struct RefreshRotation {
    /// Signature of the refresh token being exchanged.
    pub old_signature: String,

    /// The new access token record.
    pub access_token: StoredToken,

    /// The new refresh token record.
    pub refresh_token: StoredToken,

    /// Session the successors are bound to.
    pub session: Session,

    /// When set, the old token stays usable until this instant instead of
    /// being deactivated.
    pub grace_until: Option<OffsetDateTime>,
}

/// Storage trait for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a refresh token and upserts its session.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the signature already exists.
    async fn create_refresh_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()>;

    /// Loads a refresh token joined with its session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record has this signature
    /// - `InactiveToken` if the record is inactive or its session is
    ///   missing or revoked
    async fn get_refresh_token(&self, signature: &str) -> AuthResult<TokenSession>;

    /// Lists every refresh token issued under a request ID, active or not.
    async fn get_refresh_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>>;

    /// Deactivates every refresh token of a request. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the request has no refresh tokens.
    async fn revoke_refresh_token(&self, request_id: &str) -> AuthResult<()>;

    /// Caps the expiry of one refresh token of a request at `until`.
    ///
    /// A record that already expires earlier keeps its expiry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no refresh token of `request_id` has this
    /// signature.
    async fn shorten_refresh_token_expiry(
        &self,
        request_id: &str,
        signature: &str,
        until: OffsetDateTime,
    ) -> AuthResult<()>;

    /// Physically removes a refresh token. Removing an unknown signature
    /// succeeds.
    async fn delete_refresh_token(&self, signature: &str) -> AuthResult<()>;

    /// Exchanges a refresh token for a new access/refresh pair.
    ///
    /// In one atomic step the implementation must:
    ///
    /// 1. look the old token up again and require it to be active
    /// 2. deactivate every refresh token of its request, or only cap the
    ///    old token's expiry at `grace_until` when one is given
    /// 3. insert the successors under the same request ID
    /// 4. upsert the session
    ///
    /// Of two concurrent rotations of one token exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the old signature is unknown
    /// - `InactiveToken` if it was already exchanged or revoked
    /// - `Conflict` if a successor signature already exists
    async fn rotate_refresh_token(&self, rotation: &RefreshRotation) -> AuthResult<()>;
}
