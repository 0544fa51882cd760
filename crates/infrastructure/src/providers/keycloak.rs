//! Keycloak identity provider
//!
//! The realm-scoped variant. The wire client is constructed during
//! `initialize()`; the silent session check replays the persisted refresh
//! credential against the token endpoint, so a previous run's session
//! survives a restart without any interactive step.

use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use warden_application::ports::{Clock, SessionStore, Sleeper};
use warden_application::{
    AuthStateHandle, AuthorizationRedirect, IdentityProvider, ProfileLoader,
};
use warden_domain::{
    AuthError, AuthResult, ProviderConfig, StoredSession, TokenSet, UserProfile, decode_claims,
};

use crate::oidc::{GrantError, OidcHttpClient};

/// Keycloak-backed [`IdentityProvider`].
pub struct KeycloakProvider {
    config: ProviderConfig,
    state: AuthStateHandle,
    client: OnceLock<OidcHttpClient>,
    tokens: RwLock<Option<TokenSet>>,
    init_lock: Mutex<()>,
    session_store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    profile_loader: ProfileLoader,
}

impl KeycloakProvider {
    /// Creates the provider. The wire client is not constructed until
    /// [`initialize`](IdentityProvider::initialize) runs.
    #[must_use]
    pub fn new(
        config: ProviderConfig,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            state: AuthStateHandle::new(),
            client: OnceLock::new(),
            tokens: RwLock::new(None),
            init_lock: Mutex::new(()),
            session_store,
            clock,
            sleeper,
            profile_loader: ProfileLoader::new(),
        }
    }

    fn client(&self) -> AuthResult<&OidcHttpClient> {
        self.client.get().ok_or(AuthError::ProviderNotReady)
    }

    /// Installs a freshly granted token set and recomputes the expiration
    /// from the access token's own claims.
    fn install_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        let expiration = tokens.expiration_millis()?;
        if let Ok(mut cell) = self.tokens.write() {
            *cell = Some(tokens.clone());
        }
        self.state.update(|s| {
            s.is_authenticated = true;
            s.token_expiration = Some(expiration);
            s.auth_error = None;
        });
        Ok(())
    }

    async fn persist(&self, tokens: &TokenSet) {
        if let Some(stored) = StoredSession::from_tokens(tokens) {
            if let Err(error) = self.session_store.save(&stored).await {
                warn!(%error, "failed to persist session");
            }
        }
    }

    fn clear_local(&self) {
        if let Ok(mut cell) = self.tokens.write() {
            *cell = None;
        }
        self.state.update(warden_domain::AuthState::clear_session);
    }

    fn held_refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .ok()
            .and_then(|cell| cell.as_ref().and_then(|t| t.refresh_token.clone()))
    }

    /// Replays the persisted session against the token endpoint. A
    /// rejected credential concludes "not authenticated" and drops the
    /// stale entry; only transport/protocol failures are errors.
    async fn silent_check(&self, client: &OidcHttpClient) -> AuthResult<bool> {
        let stored = self
            .session_store
            .load()
            .await
            .map_err(|e| AuthError::Initialization(format!("session store read failed: {e}")))?;

        let Some(stored) = stored else {
            debug!("no persisted session, starting unauthenticated");
            return Ok(false);
        };

        match client.refresh_grant(&stored.refresh_token).await {
            Ok(tokens) => {
                self.install_tokens(&tokens)?;
                self.persist(&tokens).await;
                Ok(true)
            }
            Err(GrantError::Rejected(reason)) => {
                debug!(%reason, "persisted session no longer valid");
                if let Err(error) = self.session_store.clear().await {
                    warn!(%error, "failed to drop stale session");
                }
                Ok(false)
            }
            Err(GrantError::Transport(message)) => Err(AuthError::Initialization(format!(
                "silent session check failed: {message}"
            ))),
        }
    }

    fn settle_initialization(&self, error: Option<&AuthError>) {
        let error = error.cloned();
        self.state.update(|s| {
            if let Some(error) = error {
                s.auth_error = Some(error);
            }
            s.is_initialized = true;
            s.initializing = false;
        });
    }

    /// Ends the session after a refresh the provider would not honor.
    async fn fail_refresh(&self, reason: String) -> AuthError {
        warn!(%reason, "token refresh failed, ending session");
        if let Err(logout_error) = self.logout().await {
            warn!(%logout_error, "logout after failed refresh also failed");
        }
        let error = AuthError::TokenRefresh(reason);
        self.state.update(|s| s.auth_error = Some(error.clone()));
        error
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    fn state(&self) -> &AuthStateHandle {
        &self.state
    }

    async fn initialize(&self) -> AuthResult<bool> {
        // Settled: hand back the settled answer without a new handshake.
        let snapshot = self.state.snapshot();
        if snapshot.is_initialized {
            return Ok(snapshot.is_authenticated);
        }

        let _guard = self.init_lock.lock().await;

        // A concurrent caller may have settled it while we waited.
        let snapshot = self.state.snapshot();
        if snapshot.is_initialized {
            return Ok(snapshot.is_authenticated);
        }

        self.state.update(|s| s.initializing = true);

        if self.client.get().is_none() {
            match OidcHttpClient::new(&self.config) {
                Ok(client) => {
                    let _ = self.client.set(client);
                }
                Err(client_error) => {
                    error!(%client_error, "wire client construction failed");
                    self.settle_initialization(Some(&client_error));
                    return Err(client_error);
                }
            }
        }
        let client = self.client()?;

        match self.silent_check(client).await {
            Ok(authenticated) => {
                self.settle_initialization(None);
                info!(authenticated, "session initialized");
                Ok(authenticated)
            }
            Err(check_error) => {
                error!(%check_error, "initialization failed");
                self.settle_initialization(Some(&check_error));
                Err(check_error)
            }
        }
    }

    async fn login(&self, redirect_uri: Option<String>) -> AuthResult<AuthorizationRedirect> {
        let client = self.client()?;
        let redirect = redirect_uri.unwrap_or_else(|| self.config.redirect_uri.clone());
        // Force the credentials prompt even when the provider still holds
        // an SSO session.
        client.authorization_url(&redirect, Some("login"))
    }

    async fn complete_login(&self, code: &str) -> AuthResult<bool> {
        let client = self.client()?;
        match client.exchange_code(code, &self.config.redirect_uri).await {
            Ok(tokens) => {
                self.install_tokens(&tokens)?;
                self.persist(&tokens).await;
                info!("interactive login completed");
                Ok(true)
            }
            Err(GrantError::Rejected(reason)) => Err(AuthError::Initialization(format!(
                "authorization code exchange rejected: {reason}"
            ))),
            Err(GrantError::Transport(message)) => Err(AuthError::Network(message)),
        }
    }

    async fn logout(&self) -> AuthResult<()> {
        let client = self.client()?;
        let refresh = self.held_refresh_token();

        // Local state goes first: consumers must never observe a live
        // session backed by a credential we are about to revoke.
        self.clear_local();
        if let Err(store_error) = self.session_store.clear().await {
            warn!(%store_error, "failed to clear persisted session");
        }

        if let Some(refresh) = refresh {
            match client.revoke_session(&refresh).await {
                Ok(()) => info!("provider-side session terminated"),
                Err(GrantError::Rejected(reason)) => {
                    debug!(%reason, "provider-side session was already gone");
                }
                Err(GrantError::Transport(message)) => {
                    warn!(%message, "provider-side logout unreachable");
                    return Err(AuthError::Network(message));
                }
            }
        }
        Ok(())
    }

    fn get_token(&self) -> Option<String> {
        if !self.state.snapshot().is_authenticated {
            return None;
        }
        self.tokens
            .read()
            .ok()
            .and_then(|cell| cell.as_ref().map(|t| t.access_token.clone()))
    }

    async fn update_token(&self, min_validity_secs: u32) -> AuthResult<String> {
        let snapshot = self.state.snapshot();
        if !snapshot.is_authenticated {
            return Err(AuthError::NotAuthenticated);
        }

        let horizon = self.clock.now_millis() + i64::from(min_validity_secs) * 1000;
        if snapshot.token_expiration.is_some_and(|exp| exp > horizon) {
            return self.get_token().ok_or(AuthError::NotAuthenticated);
        }

        let client = self.client()?;
        let Some(refresh) = self.held_refresh_token() else {
            return Err(self.fail_refresh("no refresh credential held".to_string()).await);
        };

        match client.refresh_grant(&refresh).await {
            Ok(tokens) => {
                self.install_tokens(&tokens)?;
                self.persist(&tokens).await;
                debug!("access token refreshed");
                Ok(tokens.access_token)
            }
            Err(grant_error) => {
                let reason = match grant_error {
                    GrantError::Rejected(reason) | GrantError::Transport(reason) => reason,
                };
                Err(self.fail_refresh(reason).await)
            }
        }
    }

    async fn load_user_profile(&self) -> AuthResult<UserProfile> {
        if !self.state.snapshot().is_authenticated {
            return Err(AuthError::NotAuthenticated);
        }
        let access = self.get_token().ok_or(AuthError::NotAuthenticated)?;
        let client = self.client()?;

        let fetch = || {
            let access = access.clone();
            async move { client.fetch_userinfo(&access).await }
        };

        self.profile_loader
            .load(&self.state, Some(&access), fetch, self.sleeper.as_ref())
            .await
    }

    fn token_expired(&self) -> bool {
        self.state.snapshot().token_expired(self.clock.now_millis())
    }

    fn has_realm_role(&self, role: &str) -> bool {
        self.get_token()
            .and_then(|token| decode_claims(&token).ok())
            .is_some_and(|claims| claims.has_realm_role(role))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use warden_application::ports::SessionStoreError;

    use super::*;
    use crate::persistence::MemorySessionStore;

    /// Fixed-instant clock.
    struct FrozenClock;

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(1_700_000_000, 0).unwrap()
        }
    }

    /// Sleeper that yields immediately.
    struct InstantSleeper;

    #[async_trait]
    impl Sleeper for InstantSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    /// Store wrapper counting silent-check reads.
    struct CountingStore {
        inner: MemorySessionStore,
        loads: AtomicU32,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemorySessionStore::new(),
                loads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn load(&self) -> Result<Option<StoredSession>, SessionStoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load().await
        }

        async fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError> {
            self.inner.save(session).await
        }

        async fn clear(&self) -> Result<(), SessionStoreError> {
            self.inner.clear().await
        }
    }

    fn provider_with(store: Arc<CountingStore>) -> KeycloakProvider {
        let config = ProviderConfig::new(
            "https://id.example.com",
            "main",
            "demo-client",
            "https://app.example.com/callback",
        );
        KeycloakProvider::new(config, store, Arc::new(FrozenClock), Arc::new(InstantSleeper))
    }

    #[tokio::test]
    async fn concurrent_initialization_performs_one_handshake() {
        let store = Arc::new(CountingStore::new());
        let provider = provider_with(Arc::clone(&store));

        let (first, second) = tokio::join!(provider.initialize(), provider.initialize());

        assert!(!first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        let snapshot = provider.state().snapshot();
        assert!(snapshot.is_initialized);
        assert!(!snapshot.initializing);
    }

    #[tokio::test]
    async fn repeated_initialization_is_a_no_op() {
        let store = Arc::new(CountingStore::new());
        let provider = provider_with(Arc::clone(&store));

        assert!(!provider.initialize().await.unwrap());
        assert!(!provider.initialize().await.unwrap());

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_before_initialization_reports_provider_not_ready() {
        let provider = provider_with(Arc::new(CountingStore::new()));

        let result = provider.login(None).await;
        assert!(matches!(result, Err(AuthError::ProviderNotReady)));

        let logout = provider.logout().await;
        assert!(matches!(logout, Err(AuthError::ProviderNotReady)));
    }

    #[tokio::test]
    async fn login_after_initialization_builds_the_authorization_redirect() {
        let provider = provider_with(Arc::new(CountingStore::new()));
        provider.initialize().await.unwrap();

        let redirect = provider
            .login(Some("https://app.example.com/other".to_string()))
            .await
            .unwrap();

        assert!(redirect.url.contains("prompt=login"));
        assert!(redirect
            .url
            .contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fother"));
    }

    #[tokio::test]
    async fn unauthenticated_session_yields_no_token_and_rejects_refresh() {
        let provider = provider_with(Arc::new(CountingStore::new()));
        provider.initialize().await.unwrap();

        assert_eq!(provider.get_token(), None);
        assert!(provider.token_expired());
        assert!(!provider.has_realm_role("admin"));

        let refresh = provider.update_token(60).await;
        assert!(matches!(refresh, Err(AuthError::NotAuthenticated)));

        let profile = provider.load_user_profile().await;
        assert!(matches!(profile, Err(AuthError::NotAuthenticated)));
    }
}
