//! JWT ID (JTI) storage for client assertion replay prevention.
//!
//! # Implementation Notes
//!
//! `create_client_jwt` must check and insert atomically. Two concurrent
//! calls for the same JTI must not both succeed.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::ClientAssertionJti;

/// Storage trait for client assertion JTIs.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Finds a JTI entry that is active and not yet expired.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such entry. Expired entries count
    /// as absent.
    async fn get_valid_client_jwt(&self, jti: &str) -> AuthResult<ClientAssertionJti>;

    /// Records a JTI unless a valid entry for it already exists.
    ///
    /// Expired entries are evicted as part of the call.
    ///
    /// # Errors
    ///
    /// Returns `JtiKnown` if a valid entry exists.
    async fn create_client_jwt(&self, entry: &ClientAssertionJti) -> AuthResult<()>;
}
