//! Token store that fails selected operations on demand.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::{TokenError, TokenErrorCode};
use crate::storage::{
    AccessTokenStorage, ClientStorage, InMemoryTokenStore, JtiStorage, RefreshRotation,
    RefreshTokenStorage, SessionStorage,
};
use crate::types::{ClientAssertionJti, OAuthClient, Session, StoredToken, TokenSession};

/// Operations a [`FailingTokenStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    CreateAccessToken,
    CreateRefreshToken,
    GetRefreshToken,
    RotateStorage,
    RotateConflict,
}

/// Wraps an [`InMemoryTokenStore`] and fails the armed operations.
#[derive(Debug, Default)]
pub(crate) struct FailingTokenStore {
    pub(crate) inner: InMemoryTokenStore,
    armed: Mutex<Vec<Failure>>,
}

impl FailingTokenStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arm(&self, failure: Failure) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.push(failure);
        }
    }

    fn check(&self, failure: Failure) -> AuthResult<()> {
        let armed = self
            .armed
            .lock()
            .map(|armed| armed.contains(&failure))
            .unwrap_or(false);
        match (armed, failure) {
            (false, _) => Ok(()),
            (true, Failure::RotateConflict) => {
                Err(AuthError::conflict("successor signature already exists"))
            }
            (true, _) => Err(AuthError::storage("connection reset by peer")),
        }
    }
}

#[async_trait]
impl AccessTokenStorage for FailingTokenStore {
    async fn create_access_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()> {
        self.check(Failure::CreateAccessToken)?;
        self.inner.create_access_token(signature, token, session).await
    }

    async fn get_access_token(&self, signature: &str) -> AuthResult<TokenSession> {
        self.inner.get_access_token(signature).await
    }

    async fn get_access_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>> {
        self.inner.get_access_tokens_by_request_id(request_id).await
    }

    async fn revoke_access_token(&self, request_id: &str) -> AuthResult<()> {
        self.inner.revoke_access_token(request_id).await
    }

    async fn delete_access_token(&self, signature: &str) -> AuthResult<()> {
        self.inner.delete_access_token(signature).await
    }
}

#[async_trait]
impl RefreshTokenStorage for FailingTokenStore {
    async fn create_refresh_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()> {
        self.check(Failure::CreateRefreshToken)?;
        self.inner.create_refresh_token(signature, token, session).await
    }

    async fn get_refresh_token(&self, signature: &str) -> AuthResult<TokenSession> {
        self.check(Failure::GetRefreshToken)?;
        self.inner.get_refresh_token(signature).await
    }

    async fn get_refresh_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>> {
        self.inner.get_refresh_tokens_by_request_id(request_id).await
    }

    async fn revoke_refresh_token(&self, request_id: &str) -> AuthResult<()> {
        self.inner.revoke_refresh_token(request_id).await
    }

    async fn shorten_refresh_token_expiry(
        &self,
        request_id: &str,
        signature: &str,
        until: OffsetDateTime,
    ) -> AuthResult<()> {
        self.inner
            .shorten_refresh_token_expiry(request_id, signature, until)
            .await
    }

    async fn delete_refresh_token(&self, signature: &str) -> AuthResult<()> {
        self.inner.delete_refresh_token(signature).await
    }

    async fn rotate_refresh_token(&self, rotation: &RefreshRotation) -> AuthResult<()> {
        self.check(Failure::RotateStorage)?;
        self.check(Failure::RotateConflict)?;
        self.inner.rotate_refresh_token(rotation).await
    }
}

#[async_trait]
impl SessionStorage for FailingTokenStore {
    async fn create_or_update_session(&self, session: &Session) -> AuthResult<()> {
        self.inner.create_or_update_session(session).await
    }

    async fn get_session(&self, id: &str) -> AuthResult<Session> {
        self.inner.get_session(id).await
    }

    async fn revoke_session(&self, id: &str) -> AuthResult<()> {
        self.inner.revoke_session(id).await
    }
}

#[async_trait]
impl ClientStorage for FailingTokenStore {
    async fn get_client(&self, client_id: &str) -> AuthResult<OAuthClient> {
        self.inner.get_client(client_id).await
    }

    async fn create_client(&self, client: &OAuthClient) -> AuthResult<()> {
        self.inner.create_client(client).await
    }
}

#[async_trait]
impl JtiStorage for FailingTokenStore {
    async fn get_valid_client_jwt(&self, jti: &str) -> AuthResult<ClientAssertionJti> {
        self.inner.get_valid_client_jwt(jti).await
    }

    async fn create_client_jwt(&self, entry: &ClientAssertionJti) -> AuthResult<()> {
        self.inner.create_client_jwt(entry).await
    }
}

/// Asserts that `err` reaches the client as an opaque `server_error` / 500.
pub(crate) fn assert_server_error(err: &AuthError) {
    assert!(matches!(err, AuthError::ServerError { .. }), "unexpected error: {err}");
    let response = TokenError::from(err);
    assert_eq!(response.error, TokenErrorCode::ServerError);
    assert_eq!(response.http_status(), 500);
}
