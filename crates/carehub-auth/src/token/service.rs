//! In-process token service for the rest of the application.
//!
//! Mints tokens for a user the application has already signed in, through
//! the `internal` grant, and refreshes them through the
//! `internal_refresh_token` grant, both as the configured internal client.
//! The internal client is registered in the store on first use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::AuthResult;
use crate::config::InternalClientConfig;
use crate::error::AuthError;
use crate::oauth::{ClientCredentials, Provider, TokenRequest, TokenResponse};
use crate::types::{
    GRANT_INTERNAL, GRANT_INTERNAL_REFRESH_TOKEN, OAuthClient, Session, hash_client_secret,
};

/// Token pair handed to a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    /// Opaque access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Opaque refresh token.
    pub refresh_token: String,
}

impl TryFrom<TokenResponse> for AuthTokens {
    type Error = AuthError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        let refresh_token = response
            .refresh_token
            .ok_or_else(|| AuthError::server_error("token response has no refresh token"))?;
        Ok(Self {
            access_token: response.access_token,
            expires_in: response.expires_in,
            refresh_token,
        })
    }
}

/// Issues and refreshes tokens as the internal client.
pub struct TokenService {
    provider: Arc<Provider>,
    client: InternalClientConfig,
    registered: OnceCell<()>,
}

impl TokenService {
    /// Creates the service.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no `internal_client` is configured.
    pub fn new(provider: Arc<Provider>) -> AuthResult<Self> {
        let client = provider
            .config()
            .internal_client
            .clone()
            .ok_or_else(|| AuthError::configuration("internal_client is not configured"))?;
        Ok(Self {
            provider,
            client,
            registered: OnceCell::new(),
        })
    }

    /// Builds the registration the internal client needs in the client
    /// store: both internal grants and an Argon2 hash of its secret.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the secret cannot be hashed.
    pub fn internal_client_registration(config: &InternalClientConfig) -> AuthResult<OAuthClient> {
        let hash = hash_client_secret(config.client_secret.expose())
            .map_err(|e| AuthError::server_error(format!("failed to hash client secret: {e}")))?;
        let mut client = OAuthClient::new(config.client_id.clone())
            .with_grant_type(GRANT_INTERNAL)
            .with_grant_type(GRANT_INTERNAL_REFRESH_TOKEN)
            .with_secret_hash(hash);
        client.name = "Internal".to_string();
        Ok(client)
    }

    /// Registers the internal client unless the store already knows it.
    ///
    /// An existing registration is left as is.
    pub async fn ensure_internal_client(&self) -> AuthResult<()> {
        self.registered
            .get_or_try_init(|| async {
                let store = self.provider.store();
                match store.get_client(&self.client.client_id).await {
                    Ok(_) => return Ok(()),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into_server_error()),
                }

                let client = Self::internal_client_registration(&self.client)?;
                match store.create_client(&client).await {
                    Ok(()) => {
                        tracing::info!(client_id = %client.id, "Registered internal client");
                        Ok(())
                    }
                    // Registered concurrently.
                    Err(AuthError::Conflict { .. }) => Ok(()),
                    Err(e) => Err(e.into_server_error()),
                }
            })
            .await
            .map(|_| ())
    }

    /// Issues a token pair for a signed-in user.
    ///
    /// `extra` is stored with the session and returned on introspection.
    pub async fn generate_user_auth_tokens(
        &self,
        subject: &str,
        username: &str,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> AuthResult<AuthTokens> {
        self.ensure_internal_client().await?;

        let mut session = Session::new(self.client.client_id.clone(), subject).with_username(username);
        session.extra = extra;

        let form = TokenRequest::new(GRANT_INTERNAL).with_client_id(self.client.client_id.clone());
        let response = self
            .provider
            .handle_token_request(form, None, Some(session))
            .await?;
        AuthTokens::try_from(response)
    }

    /// Exchanges a refresh token for a new pair.
    pub async fn refresh_auth_tokens(&self, refresh_token: &str) -> AuthResult<AuthTokens> {
        self.ensure_internal_client().await?;

        let form = TokenRequest::new(GRANT_INTERNAL_REFRESH_TOKEN).with_refresh_token(refresh_token);
        let credentials = ClientCredentials::new(
            self.client.client_id.clone(),
            self.client.client_secret.expose(),
        );
        let response = self
            .provider
            .handle_token_request(form, Some(credentials), None)
            .await?;
        AuthTokens::try_from(response)
    }
}
