//! OAuth client registrations.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::OAuthClient;

/// Storage trait for client registrations.
///
/// Clients are managed elsewhere. The token subsystem only reads them,
/// apart from registering the internal client on first use.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client does not exist.
    async fn get_client(&self, client_id: &str) -> AuthResult<OAuthClient>;

    /// Registers a new client.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a client with this ID already exists. Existing
    /// registrations are never overwritten.
    async fn create_client(&self, client: &OAuthClient) -> AuthResult<()>;
}
