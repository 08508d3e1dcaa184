//! Token revocation.
//!
//! Revocation works on request IDs: every token of an issuance, including
//! all refresh tokens of its rotation chain, shares one. [`RevocationService::revoke_token`]
//! adds RFC 7009 revocation of a presented raw token on top.
//!
//! # Security Considerations
//!
//! - Unknown or malformed tokens are accepted silently so the endpoint does
//!   not reveal token existence
//! - A client may only revoke tokens issued to it
//! - Records are deactivated, never deleted
//!
//! # References
//!
//! - [RFC 7009 - OAuth 2.0 Token Revocation](https://tools.ietf.org/html/rfc7009)

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::oauth::request::expires_after;
use crate::oauth::{HmacTokenStrategy, Provider};
use crate::storage::TokenStore;
use crate::types::{TokenSession, TokenType};

/// Token revocation request per RFC 7009.
#[derive(Debug, Clone, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: String,

    /// Optional hint about the token type. Only decides which table is
    /// searched first.
    #[serde(default)]
    pub token_type_hint: Option<TokenType>,
}

impl RevocationRequest {
    /// Creates a request without a hint.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type_hint: None,
        }
    }

    /// Sets the token type hint.
    #[must_use]
    pub fn with_hint(mut self, hint: TokenType) -> Self {
        self.token_type_hint = Some(hint);
        self
    }

    fn lookup_order(&self) -> [TokenType; 2] {
        match self.token_type_hint {
            Some(TokenType::RefreshToken) => [TokenType::RefreshToken, TokenType::AccessToken],
            _ => [TokenType::AccessToken, TokenType::RefreshToken],
        }
    }
}

/// Revokes tokens and sessions.
pub struct RevocationService {
    store: Arc<dyn TokenStore>,
    strategy: HmacTokenStrategy,
    grace_period: Duration,
}

impl RevocationService {
    /// Creates a revocation service.
    pub fn new(store: Arc<dyn TokenStore>, strategy: HmacTokenStrategy, config: &OAuthConfig) -> Self {
        Self {
            store,
            strategy,
            grace_period: config.refresh_token_grace_period,
        }
    }

    /// Creates a revocation service sharing the provider's store and keys.
    #[must_use]
    pub fn from_provider(provider: &Provider) -> Self {
        Self::new(
            provider.store().clone(),
            provider.strategy().clone(),
            &provider.config().oauth,
        )
    }

    /// Deactivates every access token of a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the request has no access tokens. Callers that
    /// treat revocation as best effort may ignore it.
    pub async fn revoke_access_token(&self, request_id: &str) -> AuthResult<()> {
        self.store.revoke_access_token(request_id).await?;
        tracing::debug!(request_id, "Revoked access tokens");
        Ok(())
    }

    /// Deactivates every refresh token of a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the request has no refresh tokens.
    pub async fn revoke_refresh_token(&self, request_id: &str) -> AuthResult<()> {
        self.store.revoke_refresh_token(request_id).await?;
        tracing::debug!(request_id, "Revoked refresh tokens");
        Ok(())
    }

    /// Revokes a refresh token, honouring the configured grace period.
    ///
    /// With a zero grace period this is [`Self::revoke_refresh_token`].
    /// Otherwise the token identified by `signature` stays active and its
    /// expiry is capped at now + grace period.
    pub async fn revoke_refresh_token_maybe_grace_period(
        &self,
        request_id: &str,
        signature: &str,
    ) -> AuthResult<()> {
        if self.grace_period.is_zero() {
            return self.revoke_refresh_token(request_id).await;
        }

        let until = expires_after(OffsetDateTime::now_utc(), self.grace_period)?;
        self.store
            .shorten_refresh_token_expiry(request_id, signature, until)
            .await?;
        tracing::debug!(request_id, grace_until = %until, "Refresh token enters grace period");
        Ok(())
    }

    /// Revokes a presented token on behalf of `client_id` (RFC 7009).
    ///
    /// Revoking a refresh token also revokes the access tokens of its
    /// request. Revoking an access token leaves the refresh tokens alone.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the token is empty
    /// - `UnauthorizedClient` if the token was issued to another client
    /// - `ServerError` on storage failure
    pub async fn revoke_token(&self, request: &RevocationRequest, client_id: &str) -> AuthResult<()> {
        if request.token.is_empty() {
            return Err(AuthError::invalid_request("The token parameter is missing"));
        }

        let Ok(signature) = self.strategy.signature(&request.token) else {
            return Ok(());
        };
        if self.strategy.validate(&request.token).is_err() {
            return Ok(());
        }

        for token_type in request.lookup_order() {
            let found = match self.lookup(token_type, &signature).await {
                Ok(found) => found,
                Err(e) if e.is_not_found() => continue,
                // Already unusable.
                Err(e) if e.is_inactive() => return Ok(()),
                Err(e) => return Err(e.into_server_error()),
            };

            if found.token.client_id != client_id {
                tracing::warn!(
                    client_id,
                    owner = %found.token.client_id,
                    "Client attempted to revoke a token it does not own"
                );
                return Err(AuthError::unauthorized_client(
                    "The token was not issued to this client",
                ));
            }

            let request_id = found.token.request_id.as_str();
            if token_type == TokenType::RefreshToken {
                ignore_not_found(self.store.revoke_refresh_token(request_id).await)?;
            }
            ignore_not_found(self.store.revoke_access_token(request_id).await)?;

            tracing::info!(client_id, request_id, token_type = %token_type, "Revoked token");
            return Ok(());
        }

        Ok(())
    }

    /// Revokes a session, invalidating every token bound to it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn revoke_session(&self, session_id: &str) -> AuthResult<()> {
        self.store.revoke_session(session_id).await?;
        tracing::info!(session_id, "Revoked session");
        Ok(())
    }

    async fn lookup(&self, token_type: TokenType, signature: &str) -> AuthResult<TokenSession> {
        match token_type {
            TokenType::AccessToken => self.store.get_access_token(signature).await,
            TokenType::RefreshToken => self.store.get_refresh_token(signature).await,
        }
    }
}

fn ignore_not_found(result: AuthResult<()>) -> AuthResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into_server_error()),
        ok => ok,
    }
}
