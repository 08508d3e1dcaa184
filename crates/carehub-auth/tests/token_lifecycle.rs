//! End-to-end token lifecycle tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use carehub_auth::config::{AuthConfig, Lifespan, Secret};
use carehub_auth::oauth::{ClientCredentials, Provider, TokenError, TokenRequest, TokenResponse};
use carehub_auth::storage::{
    AccessTokenStorage, InMemoryTokenStore, RefreshTokenStorage, SessionStorage,
};
use carehub_auth::token::{RevocationRequest, RevocationService};
use carehub_auth::types::{
    GRANT_INTERNAL, GRANT_INTERNAL_REFRESH_TOKEN, OAuthClient, Session, TokenType,
    hash_client_secret,
};
use carehub_auth::{AuthError, AuthResult};

const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.oauth.global_secret = Secret::new(SECRET);
    config
}

/// Client A may use both internal grants; client B has no grants.
async fn setup_with(config: AuthConfig) -> (Arc<Provider>, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::new());
    store
        .insert_client(
            OAuthClient::new("client-a")
                .with_grant_type(GRANT_INTERNAL)
                .with_grant_type(GRANT_INTERNAL_REFRESH_TOKEN)
                .with_secret_hash(hash_client_secret("secret-a").unwrap()),
        )
        .await;
    store
        .insert_client(
            OAuthClient::new("client-b").with_secret_hash(hash_client_secret("secret-b").unwrap()),
        )
        .await;
    let provider = Arc::new(Provider::new(config, store.clone()).unwrap());
    (provider, store)
}

async fn setup() -> (Arc<Provider>, Arc<InMemoryTokenStore>) {
    setup_with(config()).await
}

async fn issue(provider: &Provider, client_id: &str, scope: Option<&str>) -> AuthResult<TokenResponse> {
    let mut form = TokenRequest::new(GRANT_INTERNAL).with_client_id(client_id);
    if let Some(scope) = scope {
        form = form.with_scope(scope);
    }
    let session = Session::new(client_id, "user-1").with_username("jane");
    let request = provider.new_access_request(form, None, Some(session)).await?;
    provider.new_access_response(&request).await
}

async fn refresh(provider: &Provider, refresh_token: &str) -> AuthResult<TokenResponse> {
    let form = TokenRequest::new(GRANT_INTERNAL_REFRESH_TOKEN).with_refresh_token(refresh_token);
    let credentials = ClientCredentials::new("client-a", "secret-a");
    let request = provider
        .new_access_request(form, Some(credentials), None)
        .await?;
    provider.new_access_response(&request).await
}

fn signature(provider: &Provider, token: &str) -> String {
    provider.strategy().signature(token).unwrap()
}

#[tokio::test]
async fn test_internal_grant_issues_active_pair() {
    let (provider, store) = setup().await;

    let response = issue(&provider, "client-a", Some("profile chat")).await.unwrap();
    assert_eq!(response.token_type, "bearer");
    assert_eq!(response.expires_in, 3600);
    assert_eq!(response.scope, "profile chat");
    let refresh_token = response.refresh_token.clone().unwrap();

    let access = store
        .get_access_token(&signature(&provider, &response.access_token))
        .await
        .unwrap();
    assert!(access.token.active);
    assert_eq!(access.token.requested_scopes, access.token.granted_scopes);
    assert_eq!(access.token.client_id, "client-a");
    assert_eq!(access.session.subject, "user-1");

    let refresh_record = store
        .get_refresh_token(&signature(&provider, &refresh_token))
        .await
        .unwrap();
    assert_eq!(refresh_record.token.request_id, access.token.request_id);
    assert_eq!(refresh_record.token.session_id, access.session.id);
    assert!(refresh_record.token.expires_at > access.token.expires_at);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let (provider, store) = setup().await;

    let first = issue(&provider, "client-a", None).await.unwrap();
    let first_refresh = first.refresh_token.unwrap();
    let original = store
        .get_refresh_token(&signature(&provider, &first_refresh))
        .await
        .unwrap();

    let second = refresh(&provider, &first_refresh).await.unwrap();
    let second_refresh = second.refresh_token.clone().unwrap();
    assert_ne!(second_refresh, first_refresh);
    assert_ne!(second.access_token, first.access_token);

    let rotated = store
        .get_refresh_token(&signature(&provider, &second_refresh))
        .await
        .unwrap();
    assert_eq!(rotated.token.request_id, original.token.request_id);

    let err = store
        .get_refresh_token(&signature(&provider, &first_refresh))
        .await
        .unwrap_err();
    assert!(err.is_inactive());

    let err = refresh(&provider, &first_refresh).await.unwrap_err();
    assert!(err.is_inactive());
    let token_error = TokenError::from(&err);
    assert_eq!(token_error.error.as_str(), "invalid_grant");
    assert_eq!(token_error.http_status(), 400);

    // The successor still works.
    refresh(&provider, &second_refresh).await.unwrap();
}

#[tokio::test]
async fn test_inactive_and_unknown_refresh_tokens_look_the_same() {
    let (provider, _) = setup().await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let used = issued.refresh_token.unwrap();
    refresh(&provider, &used).await.unwrap();

    let (unknown, _) = provider.strategy().generate().unwrap();

    let reused = TokenError::from(&refresh(&provider, &used).await.unwrap_err());
    let missing = TokenError::from(&refresh(&provider, &unknown).await.unwrap_err());
    assert_eq!(reused, missing);
}

#[tokio::test]
async fn test_client_without_grant_gets_no_tokens() {
    let (provider, store) = setup().await;

    let err = issue(&provider, "client-b", None).await.unwrap_err();
    let token_error = TokenError::from(&err);
    assert_eq!(token_error.error.as_str(), "unauthorized_client");
    assert_eq!(store.access_token_count().await, 0);
    assert_eq!(store.refresh_token_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_exactly_one_wins() {
    let (provider, store) = setup().await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let refresh_token = issued.refresh_token.unwrap();

    let a = {
        let provider = provider.clone();
        let token = refresh_token.clone();
        tokio::spawn(async move { refresh(&provider, &token).await })
    };
    let b = {
        let provider = provider.clone();
        let token = refresh_token.clone();
        tokio::spawn(async move { refresh(&provider, &token).await })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let (winner, loser) = match (a, b) {
        (Ok(win), Err(lose)) | (Err(lose), Ok(win)) => (win, lose),
        (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
    };
    assert_eq!(loser.oauth_error_code(), "invalid_grant");

    // One original pair plus one successor pair.
    assert_eq!(store.refresh_token_count().await, 2);
    assert_eq!(store.access_token_count().await, 2);

    let new_refresh = winner.refresh_token.unwrap();
    assert!(
        store
            .get_refresh_token(&signature(&provider, &new_refresh))
            .await
            .unwrap()
            .token
            .active
    );
}

#[tokio::test]
async fn test_refresh_by_another_client_is_invalid_grant() {
    let (provider, store) = setup().await;
    store
        .insert_client(
            OAuthClient::new("client-c")
                .with_grant_type(GRANT_INTERNAL_REFRESH_TOKEN)
                .public(),
        )
        .await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let form = TokenRequest::new(GRANT_INTERNAL_REFRESH_TOKEN)
        .with_client_id("client-c")
        .with_refresh_token(issued.refresh_token.clone().unwrap());
    let err = provider
        .handle_token_request(form, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));

    // The legitimate owner can still use it.
    refresh(&provider, &issued.refresh_token.unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_tampered_refresh_token_is_invalid_request() {
    let (provider, _) = setup().await;
    let issued = issue(&provider, "client-a", None).await.unwrap();
    let refresh_token = issued.refresh_token.unwrap();

    let (_, sig) = refresh_token.split_once('.').unwrap();
    let forged = format!("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA.{sig}");
    let err = refresh(&provider, &forged).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest { .. }));

    let err = refresh(&provider, "not-a-token").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_expired_refresh_token_is_invalid_grant() {
    let mut config = config();
    config.oauth.refresh_token_lifetime = Lifespan::Finite(Duration::from_millis(50));
    let (provider, _) = setup_with(config).await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = refresh(&provider, &issued.refresh_token.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

#[tokio::test]
async fn test_never_expiring_refresh_tokens() {
    let mut config = config();
    config.oauth.refresh_token_lifetime = Lifespan::Never;
    let (provider, store) = setup_with(config).await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let record = store
        .get_refresh_token(&signature(&provider, &issued.refresh_token.unwrap()))
        .await
        .unwrap();
    assert!(record.token.expires_at.is_none());
    assert!(record.session.get_expires_at(TokenType::RefreshToken).is_none());
}

#[tokio::test]
async fn test_grace_period_allows_reuse_until_it_ends() {
    let mut config = config();
    config.oauth.refresh_token_grace_period = Duration::from_millis(200);
    let (provider, _) = setup_with(config).await;

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let old = issued.refresh_token.unwrap();

    refresh(&provider, &old).await.unwrap();
    refresh(&provider, &old).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let err = refresh(&provider, &old).await.unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_revoke_access_token_keeps_record() {
    let (provider, store) = setup().await;
    let revocation = RevocationService::from_provider(&provider);

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let access_sig = signature(&provider, &issued.access_token);
    let request_id = store
        .get_access_token(&access_sig)
        .await
        .unwrap()
        .token
        .request_id;

    revocation.revoke_access_token(&request_id).await.unwrap();

    assert!(store.get_access_token(&access_sig).await.unwrap_err().is_inactive());
    let records = store
        .get_access_tokens_by_request_id(&request_id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].active);

    // Refresh tokens of the request are untouched.
    refresh(&provider, &issued.refresh_token.unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_rfc7009_revocation_of_refresh_token() {
    let (provider, store) = setup().await;
    let revocation = RevocationService::from_provider(&provider);

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let refresh_token = issued.refresh_token.unwrap();

    let request = RevocationRequest::new(refresh_token.clone()).with_hint(TokenType::RefreshToken);
    let err = revocation
        .revoke_token(&request, "client-b")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnauthorizedClient { .. }));

    revocation.revoke_token(&request, "client-a").await.unwrap();
    revocation.revoke_token(&request, "client-a").await.unwrap();

    assert!(refresh(&provider, &refresh_token).await.is_err());
    assert!(
        store
            .get_access_token(&signature(&provider, &issued.access_token))
            .await
            .unwrap_err()
            .is_inactive()
    );

    // Unknown and malformed tokens are accepted silently.
    let (unknown, _) = provider.strategy().generate().unwrap();
    revocation
        .revoke_token(&RevocationRequest::new(unknown), "client-a")
        .await
        .unwrap();
    revocation
        .revoke_token(&RevocationRequest::new("garbage"), "client-a")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_revoke_session_invalidates_pair() {
    let (provider, store) = setup().await;
    let revocation = RevocationService::from_provider(&provider);

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let found = provider
        .introspect_access_token(&issued.access_token)
        .await
        .unwrap();

    revocation.revoke_session(&found.session.id).await.unwrap();

    assert!(store.get_session(&found.session.id).await.unwrap().is_revoked());
    assert!(
        provider
            .introspect_access_token(&issued.access_token)
            .await
            .unwrap_err()
            .is_inactive()
    );
    let err = refresh(&provider, &issued.refresh_token.unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_revoke_refresh_token_maybe_grace_period() {
    let mut config = config();
    config.oauth.refresh_token_grace_period = Duration::from_secs(30);
    let (provider, store) = setup_with(config).await;
    let revocation = RevocationService::from_provider(&provider);

    let issued = issue(&provider, "client-a", None).await.unwrap();
    let sig = signature(&provider, &issued.refresh_token.unwrap());
    let before = store.get_refresh_token(&sig).await.unwrap().token;

    revocation
        .revoke_refresh_token_maybe_grace_period(&before.request_id, &sig)
        .await
        .unwrap();

    let after = store.get_refresh_token(&sig).await.unwrap().token;
    assert!(after.active);
    assert!(after.expires_at < before.expires_at);
}

#[tokio::test]
async fn test_refresh_request_exposes_original_grant_read_only() {
    let (provider, store) = setup().await;
    let issued = issue(&provider, "client-a", Some("profile")).await.unwrap();
    let refresh_token = issued.refresh_token.unwrap();
    let original = store
        .get_refresh_token(&signature(&provider, &refresh_token))
        .await
        .unwrap();

    // A wider scope in the refresh form does not widen the grant.
    let form = TokenRequest::new(GRANT_INTERNAL_REFRESH_TOKEN)
        .with_refresh_token(&refresh_token)
        .with_scope("profile admin");
    let request = provider
        .new_access_request(form, Some(ClientCredentials::new("client-a", "secret-a")), None)
        .await
        .unwrap();
    assert_eq!(request.id(), original.token.request_id);
    assert_eq!(request.client().id, "client-a");
    assert_eq!(request.session().id, original.session.id);
    assert_eq!(request.granted_scopes(), ["profile".to_string()]);
    assert!(request.granted_audience().is_empty());

    let response = provider.new_access_response(&request).await.unwrap();
    assert_eq!(response.scope, "profile");
    let access = store
        .get_access_token(&signature(&provider, &response.access_token))
        .await
        .unwrap();
    assert_eq!(access.token.granted_scopes, vec!["profile".to_string()]);
}
