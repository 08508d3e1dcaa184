//! Access request state shared by the handle and populate phases.

use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::oauth::grant::GrantKind;
use crate::oauth::token::TokenRequest;
use crate::types::{OAuthClient, SanitizedForm, Session, StoredToken, TokenType};

/// A token request after client resolution.
///
/// Built by [`Provider::new_access_request`](crate::oauth::Provider::new_access_request),
/// filled in by the grant handler's handle phase and consumed by
/// [`Provider::new_access_response`](crate::oauth::Provider::new_access_response).
///
/// Fields are read-only outside this crate so nothing can widen the grant
/// between the two phases.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Request ID. Refresh rotation replaces it with the original one.
    pub(crate) id: String,

    /// When the request arrived.
    pub(crate) requested_at: OffsetDateTime,

    /// The handler selected for this request.
    pub(crate) grant: GrantKind,

    /// The resolved client.
    pub(crate) client: OAuthClient,

    /// The raw form. Never persisted as is.
    pub(crate) form: TokenRequest,

    /// Session the issued tokens will be bound to.
    pub(crate) session: Session,

    /// Scopes asked for.
    pub(crate) requested_scopes: Vec<String>,

    /// Scopes granted by the handler.
    pub(crate) granted_scopes: Vec<String>,

    /// Audiences asked for.
    pub(crate) requested_audience: Vec<String>,

    /// Audiences granted by the handler.
    pub(crate) granted_audience: Vec<String>,

    /// Signature of the refresh token being exchanged, set by the refresh
    /// handler.
    pub(crate) refresh_signature: Option<String>,
}

impl AccessRequest {
    pub(crate) fn new(
        grant: GrantKind,
        client: OAuthClient,
        form: TokenRequest,
        session: Session,
    ) -> Self {
        let requested_scopes = form.scopes();
        let requested_audience = form.audiences();
        Self {
            id: Uuid::new_v4().to_string(),
            requested_at: OffsetDateTime::now_utc(),
            grant,
            client,
            form,
            session,
            requested_scopes,
            granted_scopes: Vec::new(),
            requested_audience,
            granted_audience: Vec::new(),
            refresh_signature: None,
        }
    }

    /// Request ID shared by every token of this issuance.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the request arrived.
    #[must_use]
    pub fn requested_at(&self) -> OffsetDateTime {
        self.requested_at
    }

    /// The grant handling this request.
    #[must_use]
    pub fn grant(&self) -> GrantKind {
        self.grant
    }

    /// The resolved client.
    #[must_use]
    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Session the tokens will be bound to.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Scopes asked for.
    #[must_use]
    pub fn requested_scopes(&self) -> &[String] {
        &self.requested_scopes
    }

    /// Scopes granted by the handler.
    #[must_use]
    pub fn granted_scopes(&self) -> &[String] {
        &self.granted_scopes
    }

    /// Audiences asked for.
    #[must_use]
    pub fn requested_audience(&self) -> &[String] {
        &self.requested_audience
    }

    /// Audiences granted by the handler.
    #[must_use]
    pub fn granted_audience(&self) -> &[String] {
        &self.granted_audience
    }

    /// Stamps the session with access and refresh expiries counted from
    /// `now`. A `"never"` refresh lifespan leaves the refresh expiry unset.
    pub(crate) fn set_expiries(
        &mut self,
        config: &OAuthConfig,
        now: OffsetDateTime,
    ) -> AuthResult<()> {
        let access = expires_after(now, config.access_token_lifetime)?;
        self.session.set_expires_at(TokenType::AccessToken, access);
        if let Some(lifetime) = config.refresh_token_lifetime.as_duration() {
            let refresh = expires_after(now, lifetime)?;
            self.session.set_expires_at(TokenType::RefreshToken, refresh);
        }
        Ok(())
    }

    /// Allow-listed copy of the form for storage.
    #[must_use]
    pub fn sanitized_form(&self) -> SanitizedForm {
        SanitizedForm {
            grant_type: self.grant.as_str().to_string(),
            client_id: self.form.client_id.clone(),
            scope: self.form.scope.clone(),
            audience: self.form.audience.clone(),
        }
    }

    /// Builds the record persisted for a newly issued token.
    ///
    /// The record's expiry is the session's expiry for `token_type` at this
    /// moment.
    #[must_use]
    pub fn to_stored_token(&self, signature: &str, token_type: TokenType) -> StoredToken {
        StoredToken {
            request_id: self.id.clone(),
            signature: signature.to_string(),
            active: true,
            client_id: self.client.id.clone(),
            session_id: self.session.id.clone(),
            requested_at: self.requested_at,
            expires_at: self.session.get_expires_at(token_type),
            requested_scopes: self.requested_scopes.clone(),
            granted_scopes: self.granted_scopes.clone(),
            requested_audience: self.requested_audience.clone(),
            granted_audience: self.granted_audience.clone(),
            form: self.sanitized_form(),
        }
    }
}

/// Returns `now + lifetime`.
///
/// # Errors
///
/// Returns `ServerError` if the instant falls outside the representable
/// date range.
pub(crate) fn expires_after(now: OffsetDateTime, lifetime: Duration) -> AuthResult<OffsetDateTime> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| {
            tracing::error!(lifetime = ?lifetime, "Token expiry out of range");
            AuthError::server_error("token expiry is out of range")
        })
}
