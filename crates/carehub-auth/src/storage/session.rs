//! Session storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Session;

/// Storage trait for token sessions.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Inserts the session, or replaces the one with the same ID.
    async fn create_or_update_session(&self, session: &Session) -> AuthResult<()>;

    /// Loads a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no session has this ID.
    async fn get_session(&self, id: &str) -> AuthResult<Session>;

    /// Marks a session revoked. Every token bound to it becomes inactive.
    ///
    /// Revoking an already revoked session keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no session has this ID.
    async fn revoke_session(&self, id: &str) -> AuthResult<()>;
}
