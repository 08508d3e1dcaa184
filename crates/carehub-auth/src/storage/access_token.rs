//! Access token storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Session, StoredToken, TokenSession};

/// Storage trait for access tokens.
///
/// Records are keyed by signature. The raw token value never reaches
/// this trait.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync {
    /// Stores an access token and upserts its session.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the signature already exists. Existing records
    /// are never overwritten.
    async fn create_access_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()>;

    /// Loads an access token joined with its session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record has this signature
    /// - `InactiveToken` if the record is inactive or its session is
    ///   missing or revoked
    async fn get_access_token(&self, signature: &str) -> AuthResult<TokenSession>;

    /// Lists every access token issued under a request ID, active or not.
    async fn get_access_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>>;

    /// Deactivates every access token of a request. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the request has no access tokens.
    async fn revoke_access_token(&self, request_id: &str) -> AuthResult<()>;

    /// Physically removes an access token. Removing an unknown signature
    /// succeeds.
    async fn delete_access_token(&self, signature: &str) -> AuthResult<()>;
}
