//! The `internal_refresh_token` grant.
//!
//! Exchanges a refresh token for a new access/refresh pair. The presented
//! refresh token is single use: it is deactivated in the same store
//! transaction that makes its successors visible, and its request ID
//! carries over to them.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::oauth::grant::TokenEndpointHandler;
use crate::oauth::request::{AccessRequest, expires_after};
use crate::oauth::strategy::HmacTokenStrategy;
use crate::oauth::token::{TokenResponse, UNUSABLE_TOKEN_DESCRIPTION};
use crate::storage::{RefreshRotation, TokenStore};
use crate::types::{GRANT_INTERNAL_REFRESH_TOKEN, TokenType};

/// Handler for grant type `internal_refresh_token`.
pub struct InternalRefreshHandler {
    store: Arc<dyn TokenStore>,
    strategy: HmacTokenStrategy,
    config: OAuthConfig,
}

impl InternalRefreshHandler {
    /// Creates the handler.
    pub fn new(store: Arc<dyn TokenStore>, strategy: HmacTokenStrategy, config: OAuthConfig) -> Self {
        Self {
            store,
            strategy,
            config,
        }
    }

    fn grace_until(&self, now: OffsetDateTime) -> AuthResult<Option<OffsetDateTime>> {
        let grace = self.config.refresh_token_grace_period;
        if grace.is_zero() {
            return Ok(None);
        }
        expires_after(now, grace).map(Some)
    }
}

#[async_trait]
impl TokenEndpointHandler for InternalRefreshHandler {
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> AuthResult<()> {
        if !request.client.has_grant_type(GRANT_INTERNAL_REFRESH_TOKEN) {
            return Err(AuthError::unauthorized_client(
                "The client is not allowed to use grant type 'internal_refresh_token'",
            ));
        }

        let refresh = request
            .form
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::invalid_request("The refresh_token parameter is missing"))?;
        let signature = self.strategy.signature(refresh)?;

        let original = match self.store.get_refresh_token(&signature).await {
            Ok(original) => original,
            Err(e) if e.is_not_found() => {
                return Err(AuthError::invalid_grant(UNUSABLE_TOKEN_DESCRIPTION));
            }
            Err(AuthError::InactiveToken {
                message,
                request_id,
            }) => {
                tracing::warn!(
                    client_id = %request.client.id,
                    request_id = request_id.as_deref().unwrap_or_default(),
                    "Refresh token reuse detected"
                );
                return Err(AuthError::InactiveToken {
                    message,
                    request_id,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load refresh token");
                return Err(e.into_server_error());
            }
        };

        self.strategy.validate(refresh)?;

        if original.token.is_expired() {
            return Err(AuthError::invalid_grant("The refresh token has expired"));
        }

        if original.token.client_id != request.client.id {
            return Err(AuthError::invalid_grant(
                "The client ID of this request does not match the one the token was issued to",
            ));
        }

        request.id = original.token.request_id.clone();
        request.session = original.session;
        request.requested_scopes = original.token.requested_scopes;
        request.granted_scopes = original.token.granted_scopes;
        request.requested_audience = original.token.requested_audience;
        request.granted_audience = original.token.granted_audience;
        request.refresh_signature = Some(signature);

        request.set_expiries(&self.config, OffsetDateTime::now_utc())
    }

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
    ) -> AuthResult<TokenResponse> {
        let old_signature = request.refresh_signature.clone().ok_or_else(|| {
            AuthError::server_error("refresh request was not handled before populate")
        })?;

        let (access_token, access_signature) = self.strategy.generate()?;
        let (refresh_token, refresh_signature) = self.strategy.generate()?;

        let rotation = RefreshRotation {
            old_signature,
            access_token: request.to_stored_token(&access_signature, TokenType::AccessToken),
            refresh_token: request.to_stored_token(&refresh_signature, TokenType::RefreshToken),
            session: request.session.clone(),
            grace_until: self.grace_until(OffsetDateTime::now_utc())?,
        };

        match self.store.rotate_refresh_token(&rotation).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(AuthError::invalid_grant(UNUSABLE_TOKEN_DESCRIPTION));
            }
            Err(e) if e.is_inactive() => {
                tracing::warn!(
                    client_id = %request.client.id,
                    request_id = %request.id,
                    "Refresh token was exchanged concurrently"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::error!(error = %e, request_id = %request.id, "Refresh token rotation failed");
                return Err(e.into_server_error());
            }
        }

        tracing::info!(
            client_id = %request.client.id,
            request_id = %request.id,
            "Rotated refresh token"
        );

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            &request.granted_scopes,
        )
        .with_refresh_token(refresh_token))
    }
}
