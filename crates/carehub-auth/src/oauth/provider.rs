//! Token endpoint provider.
//!
//! Resolves and authenticates the client, selects the grant handler and
//! runs the two-phase protocol:
//!
//! 1. [`Provider::new_access_request`] validates the form and runs the
//!    handler's handle phase
//! 2. [`Provider::new_access_response`] runs the populate phase, which
//!    mints and stores the tokens
//!
//! Every entry point is bounded by `request_timeout` when one is
//! configured. Dropping the returned future cancels the operation.

use std::future::Future;
use std::sync::Arc;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::grant::{
    GrantKind, InternalGrantHandler, InternalRefreshHandler, TokenEndpointHandler,
};
use crate::oauth::request::AccessRequest;
use crate::oauth::strategy::HmacTokenStrategy;
use crate::oauth::token::{ClientCredentials, TokenRequest, TokenResponse};
use crate::storage::TokenStore;
use crate::types::{OAuthClient, Session, TokenSession};

/// OAuth 2.0 token endpoint for the internal grants.
pub struct Provider {
    config: AuthConfig,
    store: Arc<dyn TokenStore>,
    strategy: HmacTokenStrategy,
    internal: InternalGrantHandler,
    internal_refresh: InternalRefreshHandler,
}

impl Provider {
    /// Creates a provider over the given store.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration does not validate.
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let strategy = HmacTokenStrategy::new(&config.oauth.global_secret)?;

        let internal =
            InternalGrantHandler::new(store.clone(), strategy.clone(), config.oauth.clone());
        let internal_refresh =
            InternalRefreshHandler::new(store.clone(), strategy.clone(), config.oauth.clone());

        Ok(Self {
            config,
            store,
            strategy,
            internal,
            internal_refresh,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns the token store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Returns the token strategy.
    #[must_use]
    pub fn strategy(&self) -> &HmacTokenStrategy {
        &self.strategy
    }

    fn handler(&self, grant: GrantKind) -> &dyn TokenEndpointHandler {
        match grant {
            GrantKind::Internal => &self.internal,
            GrantKind::InternalRefresh => &self.internal_refresh,
        }
    }

    /// Validates a token request and runs the handler's handle phase.
    ///
    /// `credentials` are the ones from an `Authorization: Basic` header, if
    /// any; otherwise `client_id`/`client_secret` from the form are used.
    /// `session` carries the authenticated subject for the internal grant
    /// and is ignored by the refresh grant.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `grant_type` is missing
    /// - `UnsupportedGrantType` if no handler matches
    /// - `InvalidClient` if the client is unknown, inactive or fails
    ///   authentication
    /// - `UnauthorizedClient` if the client lacks the grant
    /// - `InvalidScope` / `InvalidRequest` for disallowed scope or audience
    /// - any error of the handler's handle phase
    pub async fn new_access_request(
        &self,
        form: TokenRequest,
        credentials: Option<ClientCredentials>,
        session: Option<Session>,
    ) -> AuthResult<AccessRequest> {
        self.with_deadline(self.build_access_request(form, credentials, session))
            .await
    }

    /// Runs the populate phase of the handler that accepted `request`.
    pub async fn new_access_response(&self, request: &AccessRequest) -> AuthResult<TokenResponse> {
        self.with_deadline(
            self.handler(request.grant)
                .populate_token_endpoint_response(request),
        )
        .await
    }

    /// Runs both phases under a single deadline.
    pub async fn handle_token_request(
        &self,
        form: TokenRequest,
        credentials: Option<ClientCredentials>,
        session: Option<Session>,
    ) -> AuthResult<TokenResponse> {
        self.with_deadline(async {
            let request = self.build_access_request(form, credentials, session).await?;
            self.handler(request.grant)
                .populate_token_endpoint_response(&request)
                .await
        })
        .await
    }

    /// Resolves a presented access token to its record and session.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the token is malformed or its signature does
    ///   not verify
    /// - `NotFound` if the token is unknown
    /// - `InactiveToken` if it was revoked, its session was revoked, or it
    ///   has expired
    pub async fn introspect_access_token(&self, token: &str) -> AuthResult<TokenSession> {
        self.with_deadline(async {
            let signature = self.strategy.signature(token)?;
            self.strategy.validate(token)?;
            let found = self.store.get_access_token(&signature).await?;
            if found.token.is_expired() {
                return Err(AuthError::inactive_token_for(
                    "access token has expired",
                    &found.token.request_id,
                ));
            }
            Ok(found)
        })
        .await
    }

    async fn build_access_request(
        &self,
        form: TokenRequest,
        credentials: Option<ClientCredentials>,
        session: Option<Session>,
    ) -> AuthResult<AccessRequest> {
        let grant_type = form
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| AuthError::invalid_request("The grant_type parameter is missing"))?;
        let grant = GrantKind::from_grant_type(grant_type).ok_or_else(|| {
            tracing::debug!(grant_type, "Unsupported grant type");
            AuthError::unsupported_grant_type(grant_type)
        })?;

        let client = self
            .authenticate_client(grant, &form, credentials.as_ref())
            .await?;

        if !client.has_grant_type(grant.as_str()) {
            tracing::warn!(client_id = %client.id, grant_type = %grant, "Client lacks grant type");
            return Err(AuthError::unauthorized_client(format!(
                "The client is not allowed to use grant type '{grant}'"
            )));
        }

        for scope in form.scopes() {
            if !client.is_scope_allowed(&scope) {
                return Err(AuthError::invalid_scope(format!(
                    "The client is not allowed to request scope '{scope}'"
                )));
            }
        }
        for audience in form.audiences() {
            if !client.is_audience_allowed(&audience) {
                return Err(AuthError::invalid_request(format!(
                    "The client is not allowed to request audience '{audience}'"
                )));
            }
        }

        let session = session.unwrap_or_else(|| Session::new(client.id.clone(), ""));
        let mut request = AccessRequest::new(grant, client, form, session);
        self.handler(grant)
            .handle_token_endpoint_request(&mut request)
            .await?;
        Ok(request)
    }

    async fn authenticate_client(
        &self,
        grant: GrantKind,
        form: &TokenRequest,
        credentials: Option<&ClientCredentials>,
    ) -> AuthResult<OAuthClient> {
        let (client_id, secret) = match credentials {
            Some(c) => (c.client_id.as_str(), Some(c.client_secret.as_str())),
            None => (
                form.client_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| AuthError::invalid_client("Client ID is missing"))?,
                form.client_secret.as_deref(),
            ),
        };

        let client = match self.store.get_client(client_id).await {
            Ok(client) => client,
            Err(e) if e.is_not_found() => {
                return Err(AuthError::invalid_client("Unknown client"));
            }
            Err(e) => {
                tracing::error!(error = %e, client_id, "Failed to load client");
                return Err(e.into_server_error());
            }
        };

        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }

        if grant.can_skip_client_auth() || client.public {
            return Ok(client);
        }

        match secret {
            Some(secret) if client.verify_secret(secret) => Ok(client),
            _ => {
                tracing::warn!(client_id, "Client authentication failed");
                Err(AuthError::invalid_client("Client authentication failed"))
            }
        }
    }

    async fn with_deadline<T, F>(&self, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                tracing::error!(timeout = ?limit, "Token request deadline exceeded");
                AuthError::server_error("request deadline exceeded")
            })?,
            None => fut.await,
        }
    }
}
