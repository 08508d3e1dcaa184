//! The `internal` grant.
//!
//! Issues an access/refresh pair for a subject the application has already
//! authenticated. The session (subject, username, extra claims) comes from
//! the caller; the client only needs the `internal` grant entitlement.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::oauth::grant::TokenEndpointHandler;
use crate::oauth::request::AccessRequest;
use crate::oauth::strategy::HmacTokenStrategy;
use crate::oauth::token::TokenResponse;
use crate::storage::TokenStore;
use crate::types::{GRANT_INTERNAL, TokenType};

/// Handler for grant type `internal`.
pub struct InternalGrantHandler {
    store: Arc<dyn TokenStore>,
    strategy: HmacTokenStrategy,
    config: OAuthConfig,
}

impl InternalGrantHandler {
    /// Creates the handler.
    pub fn new(store: Arc<dyn TokenStore>, strategy: HmacTokenStrategy, config: OAuthConfig) -> Self {
        Self {
            store,
            strategy,
            config,
        }
    }
}

#[async_trait]
impl TokenEndpointHandler for InternalGrantHandler {
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> AuthResult<()> {
        if !request.client.has_grant_type(GRANT_INTERNAL) {
            return Err(AuthError::unauthorized_client(
                "The client is not allowed to use grant type 'internal'",
            ));
        }
        if request.session.subject.is_empty() {
            return Err(AuthError::invalid_request(
                "The internal grant requires an authenticated subject",
            ));
        }

        request.granted_scopes = request.requested_scopes.clone();
        request.granted_audience = request.requested_audience.clone();
        request.session.client_id.clone_from(&request.client.id);

        request.set_expiries(&self.config, OffsetDateTime::now_utc())
    }

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
    ) -> AuthResult<TokenResponse> {
        let (access_token, access_signature) = self.strategy.generate()?;
        let (refresh_token, refresh_signature) = self.strategy.generate()?;

        let access = request.to_stored_token(&access_signature, TokenType::AccessToken);
        self.store
            .create_access_token(&access_signature, &access, &request.session)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id = %request.id, "Failed to store access token");
                e.into_server_error()
            })?;

        let refresh = request.to_stored_token(&refresh_signature, TokenType::RefreshToken);
        if let Err(e) = self
            .store
            .create_refresh_token(&refresh_signature, &refresh, &request.session)
            .await
        {
            tracing::error!(error = %e, request_id = %request.id, "Failed to store refresh token");
            // The pair is issued together or not at all.
            if let Err(cleanup) = self.store.delete_access_token(&access_signature).await {
                tracing::error!(
                    error = %cleanup,
                    request_id = %request.id,
                    "Failed to remove access token of an incomplete pair"
                );
            }
            return Err(e.into_server_error());
        }

        tracing::info!(
            client_id = %request.client.id,
            request_id = %request.id,
            scopes = ?request.granted_scopes,
            "Issued internal token pair"
        );

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            &request.granted_scopes,
        )
        .with_refresh_token(refresh_token))
    }
}
