//! In-memory token store.
//!
//! All tables sit behind one `tokio::sync::RwLock`. Every trait method takes
//! the lock once and never awaits while holding it, so each call is a
//! single critical section. That is what makes `rotate_refresh_token` and
//! `create_client_jwt` atomic.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{
    AccessTokenStorage, ClientStorage, JtiStorage, RefreshRotation, RefreshTokenStorage,
    SessionStorage,
};
use crate::types::{ClientAssertionJti, OAuthClient, Session, StoredToken, TokenSession};

/// One token table with its request ID index.
#[derive(Debug, Default)]
struct TokenTable {
    by_signature: HashMap<String, StoredToken>,
    by_request: HashMap<String, BTreeSet<String>>,
}

impl TokenTable {
    fn contains(&self, signature: &str) -> bool {
        self.by_signature.contains_key(signature)
    }

    fn insert(&mut self, signature: &str, token: &StoredToken) -> AuthResult<()> {
        if self.contains(signature) {
            return Err(AuthError::conflict(format!(
                "token signature already exists for request {}",
                token.request_id
            )));
        }
        let mut record = token.clone();
        record.signature = signature.to_string();
        self.by_request
            .entry(record.request_id.clone())
            .or_default()
            .insert(signature.to_string());
        self.by_signature.insert(signature.to_string(), record);
        Ok(())
    }

    fn by_request_id(&self, request_id: &str) -> Vec<StoredToken> {
        self.by_request
            .get(request_id)
            .into_iter()
            .flatten()
            .filter_map(|sig| self.by_signature.get(sig))
            .cloned()
            .collect()
    }

    /// Applies `f` to every record of a request; returns how many matched.
    fn update_request(&mut self, request_id: &str, mut f: impl FnMut(&mut StoredToken)) -> usize {
        let Some(signatures) = self.by_request.get(request_id) else {
            return 0;
        };
        let mut count = 0;
        for sig in signatures {
            if let Some(token) = self.by_signature.get_mut(sig) {
                f(token);
                count += 1;
            }
        }
        count
    }

    fn remove(&mut self, signature: &str) {
        if let Some(token) = self.by_signature.remove(signature)
            && let Some(signatures) = self.by_request.get_mut(&token.request_id)
        {
            signatures.remove(signature);
            if signatures.is_empty() {
                self.by_request.remove(&token.request_id);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<String, OAuthClient>,
    sessions: HashMap<String, Session>,
    access_tokens: TokenTable,
    refresh_tokens: TokenTable,
    jtis: HashMap<String, ClientAssertionJti>,
}

impl Tables {
    /// Joins a token with its session, enforcing activity rules.
    fn join(&self, token: Option<&StoredToken>, kind: &str) -> AuthResult<TokenSession> {
        let token = token.ok_or_else(|| AuthError::not_found(format!("{kind} not found")))?;

        if !token.active {
            return Err(AuthError::inactive_token_for(
                format!("{kind} is no longer active"),
                &token.request_id,
            ));
        }

        match self.sessions.get(&token.session_id) {
            Some(session) if !session.is_revoked() => Ok(TokenSession {
                token: token.clone(),
                session: session.clone(),
            }),
            Some(_) => Err(AuthError::inactive_token_for(
                format!("session of {kind} has been revoked"),
                &token.request_id,
            )),
            None => Err(AuthError::inactive_token_for(
                format!("session of {kind} does not exist"),
                &token.request_id,
            )),
        }
    }
}

/// Token store backed by in-process hash maps.
///
/// Suitable for tests and single-instance deployments. Data is lost when
/// the process exits.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tables: RwLock<Tables>,
}

impl InMemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a client.
    pub async fn insert_client(&self, client: OAuthClient) {
        let mut tables = self.tables.write().await;
        tables.clients.insert(client.id.clone(), client);
    }

    /// Number of stored access tokens, active or not.
    pub async fn access_token_count(&self) -> usize {
        self.tables.read().await.access_tokens.by_signature.len()
    }

    /// Number of stored refresh tokens, active or not.
    pub async fn refresh_token_count(&self) -> usize {
        self.tables.read().await.refresh_tokens.by_signature.len()
    }
}

#[async_trait]
impl AccessTokenStorage for InMemoryTokenStore {
    async fn create_access_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        tables.access_tokens.insert(signature, token)?;
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_access_token(&self, signature: &str) -> AuthResult<TokenSession> {
        let tables = self.tables.read().await;
        tables.join(
            tables.access_tokens.by_signature.get(signature),
            "access token",
        )
    }

    async fn get_access_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>> {
        Ok(self.tables.read().await.access_tokens.by_request_id(request_id))
    }

    async fn revoke_access_token(&self, request_id: &str) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        match tables
            .access_tokens
            .update_request(request_id, |t| t.active = false)
        {
            0 => Err(AuthError::not_found(format!(
                "no access token for request {request_id}"
            ))),
            _ => Ok(()),
        }
    }

    async fn delete_access_token(&self, signature: &str) -> AuthResult<()> {
        self.tables.write().await.access_tokens.remove(signature);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryTokenStore {
    async fn create_refresh_token(
        &self,
        signature: &str,
        token: &StoredToken,
        session: &Session,
    ) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.insert(signature, token)?;
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, signature: &str) -> AuthResult<TokenSession> {
        let tables = self.tables.read().await;
        tables.join(
            tables.refresh_tokens.by_signature.get(signature),
            "refresh token",
        )
    }

    async fn get_refresh_tokens_by_request_id(
        &self,
        request_id: &str,
    ) -> AuthResult<Vec<StoredToken>> {
        Ok(self
            .tables
            .read()
            .await
            .refresh_tokens
            .by_request_id(request_id))
    }

    async fn revoke_refresh_token(&self, request_id: &str) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        match tables
            .refresh_tokens
            .update_request(request_id, |t| t.active = false)
        {
            0 => Err(AuthError::not_found(format!(
                "no refresh token for request {request_id}"
            ))),
            _ => Ok(()),
        }
    }

    async fn shorten_refresh_token_expiry(
        &self,
        request_id: &str,
        signature: &str,
        until: OffsetDateTime,
    ) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        let token = tables
            .refresh_tokens
            .by_signature
            .get_mut(signature)
            .filter(|t| t.request_id == request_id)
            .ok_or_else(|| {
                AuthError::not_found(format!("no such refresh token for request {request_id}"))
            })?;
        token.expires_at = Some(cap_expiry(token.expires_at, until));
        Ok(())
    }

    async fn delete_refresh_token(&self, signature: &str) -> AuthResult<()> {
        self.tables.write().await.refresh_tokens.remove(signature);
        Ok(())
    }

    async fn rotate_refresh_token(&self, rotation: &RefreshRotation) -> AuthResult<()> {
        let mut tables = self.tables.write().await;

        // Re-resolve under the write lock; a concurrent rotation that got
        // here first has already deactivated the token.
        let old = tables
            .join(
                tables.refresh_tokens.by_signature.get(&rotation.old_signature),
                "refresh token",
            )?
            .token;

        let access_sig = &rotation.access_token.signature;
        let refresh_sig = &rotation.refresh_token.signature;
        if tables.access_tokens.contains(access_sig) || tables.refresh_tokens.contains(refresh_sig)
        {
            return Err(AuthError::conflict(format!(
                "successor signature already exists for request {}",
                old.request_id
            )));
        }

        let request_id = old.request_id.clone();
        match rotation.grace_until {
            Some(until) => {
                if let Some(t) = tables
                    .refresh_tokens
                    .by_signature
                    .get_mut(&rotation.old_signature)
                {
                    t.expires_at = Some(cap_expiry(t.expires_at, until));
                }
            }
            None => {
                tables
                    .refresh_tokens
                    .update_request(&request_id, |t| t.active = false);
            }
        }

        let mut access = rotation.access_token.clone();
        access.request_id.clone_from(&request_id);
        let mut refresh = rotation.refresh_token.clone();
        refresh.request_id = request_id;

        tables.access_tokens.insert(access_sig, &access)?;
        tables.refresh_tokens.insert(refresh_sig, &refresh)?;
        tables
            .sessions
            .insert(rotation.session.id.clone(), rotation.session.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for InMemoryTokenStore {
    async fn create_or_update_session(&self, session: &Session) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> AuthResult<Session> {
        self.tables
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| AuthError::not_found(format!("session {id} not found")))
    }

    async fn revoke_session(&self, id: &str) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found(format!("session {id} not found")))?;
        if session.revoked_at.is_none() {
            session.revoked_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }
}

#[async_trait]
impl ClientStorage for InMemoryTokenStore {
    async fn get_client(&self, client_id: &str) -> AuthResult<OAuthClient> {
        self.tables
            .read()
            .await
            .clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found(format!("client {client_id} not found")))
    }

    async fn create_client(&self, client: &OAuthClient) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        if tables.clients.contains_key(&client.id) {
            return Err(AuthError::conflict(format!(
                "client {} already exists",
                client.id
            )));
        }
        tables.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }
}

#[async_trait]
impl JtiStorage for InMemoryTokenStore {
    async fn get_valid_client_jwt(&self, jti: &str) -> AuthResult<ClientAssertionJti> {
        let now = OffsetDateTime::now_utc();
        self.tables
            .read()
            .await
            .jtis
            .get(jti)
            .filter(|entry| entry.is_valid_at(now))
            .cloned()
            .ok_or_else(|| AuthError::not_found(format!("jti {jti} not found")))
    }

    async fn create_client_jwt(&self, entry: &ClientAssertionJti) -> AuthResult<()> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables.write().await;
        tables.jtis.retain(|_, existing| existing.is_valid_at(now));
        if tables.jtis.contains_key(&entry.jti) {
            return Err(AuthError::jti_known(&entry.jti));
        }
        tables.jtis.insert(entry.jti.clone(), entry.clone());
        Ok(())
    }
}

fn cap_expiry(current: Option<OffsetDateTime>, until: OffsetDateTime) -> OffsetDateTime {
    match current {
        Some(exp) if exp < until => exp,
        _ => until,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SanitizedForm;
    use time::Duration;

    fn session() -> Session {
        Session::new("client-a", "user-1")
    }

    fn token(request_id: &str, signature: &str, session: &Session) -> StoredToken {
        StoredToken {
            request_id: request_id.to_string(),
            signature: signature.to_string(),
            active: true,
            client_id: session.client_id.clone(),
            session_id: session.id.clone(),
            requested_at: OffsetDateTime::now_utc(),
            expires_at: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
            requested_scopes: vec!["profile".to_string()],
            granted_scopes: vec!["profile".to_string()],
            requested_audience: vec![],
            granted_audience: vec![],
            form: SanitizedForm::default(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_access_token() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_access_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        let found = store.get_access_token("sig-1").await.unwrap();
        assert_eq!(found.token.request_id, "req-1");
        assert_eq!(found.session.id, s.id);
        assert!(found.token.active);
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_refresh_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        let err = store
            .create_refresh_token("sig-1", &token("req-2", "sig-1", &s), &s)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));

        let found = store.get_refresh_token("sig-1").await.unwrap();
        assert_eq!(found.token.request_id, "req-1");
    }

    #[tokio::test]
    async fn test_unknown_signature_is_not_found() {
        let store = InMemoryTokenStore::new();
        assert!(store.get_access_token("nope").await.unwrap_err().is_not_found());
        assert!(store.get_refresh_token("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_revoke_access_token_keeps_record() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_access_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        store.revoke_access_token("req-1").await.unwrap();
        store.revoke_access_token("req-1").await.unwrap();

        let err = store.get_access_token("sig-1").await.unwrap_err();
        match err {
            AuthError::InactiveToken { request_id, .. } => {
                assert_eq!(request_id.as_deref(), Some("req-1"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let records = store.get_access_tokens_by_request_id("req-1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].active);
    }

    #[tokio::test]
    async fn test_revoke_unknown_request_is_not_found() {
        let store = InMemoryTokenStore::new();
        assert!(store.revoke_access_token("x").await.unwrap_err().is_not_found());
        assert!(store.revoke_refresh_token("x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_or_revoked_session_is_inactive() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_access_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        store.revoke_session(&s.id).await.unwrap();
        assert!(store.get_access_token("sig-1").await.unwrap_err().is_inactive());

        let orphan = token("req-2", "sig-2", &Session::new("client-a", "ghost"));
        {
            let mut tables = store.tables.write().await;
            tables.access_tokens.insert("sig-2", &orphan).unwrap();
        }
        assert!(store.get_access_token("sig-2").await.unwrap_err().is_inactive());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_access_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        store.delete_access_token("sig-1").await.unwrap();
        store.delete_access_token("sig-1").await.unwrap();
        assert_eq!(store.access_token_count().await, 0);
        assert!(
            store
                .get_access_tokens_by_request_id("req-1")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_shorten_refresh_token_expiry() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_refresh_token("sig-1", &token("req-1", "sig-1", &s), &s)
            .await
            .unwrap();

        let until = OffsetDateTime::now_utc() + Duration::seconds(30);
        store
            .shorten_refresh_token_expiry("req-1", "sig-1", until)
            .await
            .unwrap();
        let found = store.get_refresh_token("sig-1").await.unwrap();
        assert_eq!(found.token.expires_at, Some(until));
        assert!(found.token.active);

        // Never extends.
        store
            .shorten_refresh_token_expiry("req-1", "sig-1", until + Duration::days(1))
            .await
            .unwrap();
        let found = store.get_refresh_token("sig-1").await.unwrap();
        assert_eq!(found.token.expires_at, Some(until));

        assert!(
            store
                .shorten_refresh_token_expiry("req-other", "sig-1", until)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    fn rotation(old: &str, new_access: &str, new_refresh: &str, s: &Session) -> RefreshRotation {
        RefreshRotation {
            old_signature: old.to_string(),
            access_token: token("ignored", new_access, s),
            refresh_token: token("ignored", new_refresh, s),
            session: s.clone(),
            grace_until: None,
        }
    }

    #[tokio::test]
    async fn test_rotate_refresh_token() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_refresh_token("rt-1", &token("req-1", "rt-1", &s), &s)
            .await
            .unwrap();

        store
            .rotate_refresh_token(&rotation("rt-1", "at-2", "rt-2", &s))
            .await
            .unwrap();

        assert!(store.get_refresh_token("rt-1").await.unwrap_err().is_inactive());
        let new = store.get_refresh_token("rt-2").await.unwrap();
        assert_eq!(new.token.request_id, "req-1");
        let access = store.get_access_token("at-2").await.unwrap();
        assert_eq!(access.token.request_id, "req-1");

        let err = store
            .rotate_refresh_token(&rotation("rt-1", "at-3", "rt-3", &s))
            .await
            .unwrap_err();
        assert!(err.is_inactive());
        assert_eq!(store.refresh_token_count().await, 2);
    }

    #[tokio::test]
    async fn test_rotate_with_grace_period_keeps_old_active() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_refresh_token("rt-1", &token("req-1", "rt-1", &s), &s)
            .await
            .unwrap();

        let until = OffsetDateTime::now_utc() + Duration::seconds(10);
        let mut rot = rotation("rt-1", "at-2", "rt-2", &s);
        rot.grace_until = Some(until);
        store.rotate_refresh_token(&rot).await.unwrap();

        let old = store.get_refresh_token("rt-1").await.unwrap();
        assert_eq!(old.token.expires_at, Some(until));
    }

    #[tokio::test]
    async fn test_rotate_conflict_leaves_old_active() {
        let store = InMemoryTokenStore::new();
        let s = session();
        store
            .create_refresh_token("rt-1", &token("req-1", "rt-1", &s), &s)
            .await
            .unwrap();
        store
            .create_access_token("at-x", &token("req-9", "at-x", &s), &s)
            .await
            .unwrap();

        let err = store
            .rotate_refresh_token(&rotation("rt-1", "at-x", "rt-2", &s))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
        assert!(store.get_refresh_token("rt-1").await.unwrap().token.active);
    }

    #[test]
    fn test_session_upsert_and_revoke() {
        tokio_test::block_on(async {
            let store = InMemoryTokenStore::new();
            let mut s = session();
            store.create_or_update_session(&s).await.unwrap();

            s.username = "jane".to_string();
            store.create_or_update_session(&s).await.unwrap();
            assert_eq!(store.get_session(&s.id).await.unwrap().username, "jane");

            store.revoke_session(&s.id).await.unwrap();
            let first = store.get_session(&s.id).await.unwrap().revoked_at;
            store.revoke_session(&s.id).await.unwrap();
            assert_eq!(store.get_session(&s.id).await.unwrap().revoked_at, first);

            assert!(store.get_session("missing").await.unwrap_err().is_not_found());
            assert!(store.revoke_session("missing").await.unwrap_err().is_not_found());
        });
    }

    #[tokio::test]
    async fn test_client_lookup() {
        let store = InMemoryTokenStore::new();
        store.insert_client(OAuthClient::new("client-a")).await;

        assert_eq!(store.get_client("client-a").await.unwrap().id, "client-a");
        assert!(store.get_client("client-b").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_client_never_overwrites() {
        let store = InMemoryTokenStore::new();
        store
            .create_client(&OAuthClient::new("client-a").with_grant_type("internal"))
            .await
            .unwrap();

        let err = store
            .create_client(&OAuthClient::new("client-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
        assert!(
            store
                .get_client("client-a")
                .await
                .unwrap()
                .has_grant_type("internal")
        );
    }

    #[tokio::test]
    async fn test_jti_conditional_insert() {
        let store = InMemoryTokenStore::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);

        store
            .create_client_jwt(&ClientAssertionJti::new("jti-1", exp))
            .await
            .unwrap();
        assert!(store.get_valid_client_jwt("jti-1").await.is_ok());

        let err = store
            .create_client_jwt(&ClientAssertionJti::new("jti-1", exp))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JtiKnown { .. }));
    }

    #[tokio::test]
    async fn test_expired_jti_is_evicted() {
        let store = InMemoryTokenStore::new();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        {
            let mut tables = store.tables.write().await;
            tables
                .jtis
                .insert("old".to_string(), ClientAssertionJti::new("old", past));
        }
        assert!(store.get_valid_client_jwt("old").await.unwrap_err().is_not_found());

        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);
        store
            .create_client_jwt(&ClientAssertionJti::new("old", exp))
            .await
            .unwrap();
        assert!(store.get_valid_client_jwt("old").await.is_ok());
    }
}
