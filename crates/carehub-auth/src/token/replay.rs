//! Client assertion replay guard.
//!
//! Remembers the `jti` of every accepted client assertion until the
//! assertion's own `exp`. A second assertion with a known, unexpired `jti`
//! is a replay.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::TokenStore;
use crate::types::ClientAssertionJti;

/// JTI cache over the token store.
pub struct ReplayGuard {
    store: Arc<dyn TokenStore>,
}

impl ReplayGuard {
    /// Creates a guard over the given store.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Checks that `jti` has not been seen, or has expired.
    ///
    /// # Errors
    ///
    /// Returns `JtiKnown` if an unexpired entry exists.
    pub async fn client_assertion_jwt_valid(&self, jti: &str) -> AuthResult<()> {
        match self.store.get_valid_client_jwt(jti).await {
            Ok(_) => {
                tracing::warn!(jti, "Client assertion replay detected");
                Err(AuthError::jti_known(jti))
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into_server_error()),
        }
    }

    /// Records `jti` as used until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns `JtiKnown` if the JTI is already in use, including when a
    /// concurrent call for the same JTI won the insert.
    pub async fn set_client_assertion_jwt(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> AuthResult<()> {
        self.client_assertion_jwt_valid(jti).await?;

        match self
            .store
            .create_client_jwt(&ClientAssertionJti::new(jti, expires_at))
            .await
        {
            Ok(()) => Ok(()),
            Err(e @ AuthError::JtiKnown { .. }) => {
                tracing::warn!(jti, "Client assertion replay detected");
                Err(e)
            }
            Err(e) => Err(e.into_server_error()),
        }
    }
}
