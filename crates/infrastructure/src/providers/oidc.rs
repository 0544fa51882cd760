//! Generic OIDC identity provider
//!
//! Mirrors the behavior of a self-renewing OIDC user-agent library: the
//! persisted user is accepted without network when still valid, renewal
//! runs in a background task owned by the provider, and every session
//! transition surfaces on an event stream. The poll scheduler is never
//! installed for this variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};
use warden_application::ports::{Clock, SessionStore, Sleeper};
use warden_application::{
    AuthStateHandle, AuthorizationRedirect, IdentityProvider, ProfileLoader,
};
use warden_domain::{
    AuthError, AuthResult, ProviderConfig, StoredSession, TokenSet, UserProfile,
};

use crate::oidc::{GrantError, OidcHttpClient};

/// How far ahead of expiry the silent-renew task refreshes.
const RENEW_LEAD_MS: i64 = 60_000;

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 16;

/// Session lifecycle events emitted by [`OidcSessionProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user session was installed (initial load, login, or renewal).
    UserLoaded,
    /// The session was removed.
    UserUnloaded,
    /// Background renewal failed.
    SilentRenewError(String),
    /// The access token passed its expiry before renewal landed.
    AccessTokenExpired,
}

/// The shared cells both the provider and its renew task mutate.
#[derive(Clone)]
struct SessionCells {
    state: AuthStateHandle,
    tokens: Arc<RwLock<Option<TokenSet>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionCells {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: AuthStateHandle::new(),
            tokens: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// Installs a user session: tokens, expiration from claims, and the
    /// profile the claims already carry.
    fn load_user(&self, tokens: &TokenSet) -> AuthResult<()> {
        let claims = tokens.claims()?;
        let expiration = claims
            .expiration_millis()
            .ok_or_else(|| AuthError::InvalidToken("token carries no exp claim".to_string()))?;
        let profile = claims.to_profile();

        if let Ok(mut cell) = self.tokens.write() {
            *cell = Some(tokens.clone());
        }
        self.state.update(|s| {
            s.is_authenticated = true;
            s.token_expiration = Some(expiration);
            s.user_profile = Some(profile);
            s.auth_error = None;
        });
        let _ = self.events.send(SessionEvent::UserLoaded);
        Ok(())
    }

    fn unload_user(&self) {
        if let Ok(mut cell) = self.tokens.write() {
            *cell = None;
        }
        self.state.update(warden_domain::AuthState::clear_session);
        let _ = self.events.send(SessionEvent::UserUnloaded);
    }

    fn record_renew_error(&self, reason: &str) {
        let renew_error = AuthError::TokenRefresh(reason.to_string());
        self.state.update(|s| s.auth_error = Some(renew_error));
        let _ = self
            .events
            .send(SessionEvent::SilentRenewError(reason.to_string()));
    }

    fn held_refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .ok()
            .and_then(|cell| cell.as_ref().and_then(|t| t.refresh_token.clone()))
    }
}

/// Generic OIDC [`IdentityProvider`] with self-managed silent renewal.
pub struct OidcSessionProvider {
    config: ProviderConfig,
    cells: SessionCells,
    client: OidcHttpClient,
    init_lock: Mutex<()>,
    session_store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    profile_loader: ProfileLoader,
    renew_started: AtomicBool,
}

impl OidcSessionProvider {
    /// Creates the provider; the wire client is constructed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Initialization`] when the configuration does
    /// not yield a usable wire client.
    pub fn new(
        config: ProviderConfig,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> AuthResult<Self> {
        let client = OidcHttpClient::new(&config)?;
        Ok(Self {
            config,
            cells: SessionCells::new(),
            client,
            init_lock: Mutex::new(()),
            session_store,
            clock,
            sleeper,
            profile_loader: ProfileLoader::new(),
            renew_started: AtomicBool::new(false),
        })
    }

    /// Registers for session lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.cells.events.subscribe()
    }

    fn spawn_silent_renew(&self) {
        if self.renew_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let cells = self.cells.clone();
        let client = self.client.clone();
        let store = Arc::clone(&self.session_store);
        let clock = Arc::clone(&self.clock);
        let sleeper = Arc::clone(&self.sleeper);
        tokio::spawn(silent_renew_loop(cells, client, store, clock, sleeper));
    }

    fn settle_initialization(&self, init_error: Option<&AuthError>) {
        let init_error = init_error.cloned();
        self.cells.state.update(|s| {
            if let Some(init_error) = init_error {
                s.auth_error = Some(init_error);
            }
            s.is_initialized = true;
            s.initializing = false;
        });
    }
}

#[async_trait]
impl IdentityProvider for OidcSessionProvider {
    fn state(&self) -> &AuthStateHandle {
        &self.cells.state
    }

    async fn initialize(&self) -> AuthResult<bool> {
        let snapshot = self.cells.state.snapshot();
        if snapshot.is_initialized {
            return Ok(snapshot.is_authenticated);
        }

        let _guard = self.init_lock.lock().await;

        let snapshot = self.cells.state.snapshot();
        if snapshot.is_initialized {
            return Ok(snapshot.is_authenticated);
        }

        self.cells.state.update(|s| s.initializing = true);

        let loaded = match self.session_store.load().await {
            Ok(stored) => stored,
            Err(store_error) => {
                let init_error =
                    AuthError::Initialization(format!("session store read failed: {store_error}"));
                error!(%init_error, "initialization failed");
                self.settle_initialization(Some(&init_error));
                return Err(init_error);
            }
        };

        // Accept a persisted, still-valid user without touching the
        // network; renewal handles the rest of its lifetime.
        if let Some(tokens) = loaded.as_ref().and_then(StoredSession::to_tokens) {
            let unexpired = tokens
                .expiration_millis()
                .is_ok_and(|exp| exp > self.clock.now_millis());
            if unexpired {
                if let Err(load_error) = self.cells.load_user(&tokens) {
                    warn!(%load_error, "persisted user was not loadable");
                }
            } else {
                debug!("persisted user has expired, starting unauthenticated");
            }
        }

        self.spawn_silent_renew();
        self.settle_initialization(None);

        let authenticated = self.cells.state.snapshot().is_authenticated;
        info!(authenticated, "session initialized");
        Ok(authenticated)
    }

    async fn login(&self, redirect_uri: Option<String>) -> AuthResult<AuthorizationRedirect> {
        let redirect = redirect_uri.unwrap_or_else(|| self.config.redirect_uri.clone());
        self.client.authorization_url(&redirect, None)
    }

    async fn complete_login(&self, code: &str) -> AuthResult<bool> {
        match self.client.exchange_code(code, &self.config.redirect_uri).await {
            Ok(tokens) => {
                self.cells.load_user(&tokens)?;
                if let Some(stored) = StoredSession::from_tokens(&tokens) {
                    if let Err(store_error) = self.session_store.save(&stored).await {
                        warn!(%store_error, "failed to persist session");
                    }
                }
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
        let refresh = self.cells.held_refresh_token();

        self.cells.unload_user();
        if let Err(store_error) = self.session_store.clear().await {
            warn!(%store_error, "failed to clear persisted session");
        }

        if let Some(refresh) = refresh {
            match self.client.revoke_session(&refresh).await {
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
        if !self.cells.state.snapshot().is_authenticated {
            return None;
        }
        self.cells
            .tokens
            .read()
            .ok()
            .and_then(|cell| cell.as_ref().map(|t| t.access_token.clone()))
    }

    async fn update_token(&self, min_validity_secs: u32) -> AuthResult<String> {
        let snapshot = self.cells.state.snapshot();
        if !snapshot.is_authenticated {
            return Err(AuthError::NotAuthenticated);
        }

        let horizon = self.clock.now_millis() + i64::from(min_validity_secs) * 1000;
        if snapshot.token_expiration.is_some_and(|exp| exp > horizon) {
            return self.get_token().ok_or(AuthError::NotAuthenticated);
        }

        let Some(refresh) = self.cells.held_refresh_token() else {
            self.cells.record_renew_error("no refresh credential held");
            self.cells.unload_user();
            return Err(AuthError::TokenRefresh(
                "no refresh credential held".to_string(),
            ));
        };

        match self.client.refresh_grant(&refresh).await {
            Ok(tokens) => {
                self.cells.load_user(&tokens)?;
                if let Some(stored) = StoredSession::from_tokens(&tokens) {
                    if let Err(store_error) = self.session_store.save(&stored).await {
                        warn!(%store_error, "failed to persist session");
                    }
                }
                debug!("access token refreshed");
                Ok(tokens.access_token)
            }
            Err(grant_error) => {
                let reason = grant_error.to_string();
                warn!(%reason, "token refresh failed, ending session");
                self.cells.record_renew_error(&reason);
                if let Err(logout_error) = self.logout().await {
                    warn!(%logout_error, "logout after failed refresh also failed");
                }
                Err(AuthError::TokenRefresh(reason))
            }
        }
    }

    async fn load_user_profile(&self) -> AuthResult<UserProfile> {
        if !self.cells.state.snapshot().is_authenticated {
            return Err(AuthError::NotAuthenticated);
        }
        let access = self.get_token().ok_or(AuthError::NotAuthenticated)?;
        let client = &self.client;

        let fetch = || {
            let access = access.clone();
            async move { client.fetch_userinfo(&access).await }
        };

        self.profile_loader
            .load(&self.cells.state, Some(&access), fetch, self.sleeper.as_ref())
            .await
    }

    fn token_expired(&self) -> bool {
        self.cells
            .state
            .snapshot()
            .token_expired(self.clock.now_millis())
    }

    fn manages_own_refresh(&self) -> bool {
        true
    }
}

/// The provider's own renewal: wake ahead of expiry, refresh, publish the
/// outcome as events. The loop parks while the session is unauthenticated
/// and picks back up on the next user load.
async fn silent_renew_loop(
    cells: SessionCells,
    client: OidcHttpClient,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
) {
    let mut state_rx = cells.state.subscribe();
    loop {
        let snapshot = cells.state.snapshot();
        let Some(expiration) = snapshot
            .token_expiration
            .filter(|_| snapshot.is_authenticated)
        else {
            // Park until something changes; the channel only closes when
            // the provider itself is gone.
            if state_rx.changed().await.is_err() {
                break;
            }
            continue;
        };

        let now = clock.now_millis();
        let due_in = expiration - now - RENEW_LEAD_MS;
        if due_in > 0 {
            sleeper
                .sleep(Duration::from_millis(u64::try_from(due_in).unwrap_or(0)))
                .await;
            // Re-read the state after waking; a logout or a manual refresh
            // may have landed meanwhile.
            continue;
        }

        if now >= expiration {
            let _ = cells.events.send(SessionEvent::AccessTokenExpired);
        }

        let Some(refresh) = cells.held_refresh_token() else {
            cells.record_renew_error("no refresh credential held");
            cells.unload_user();
            continue;
        };

        match client.refresh_grant(&refresh).await {
            Ok(tokens) => match cells.load_user(&tokens) {
                Ok(()) => {
                    if let Some(stored) = StoredSession::from_tokens(&tokens) {
                        if let Err(store_error) = store.save(&stored).await {
                            warn!(%store_error, "failed to persist renewed session");
                        }
                    }
                    debug!("silent renewal complete");
                }
                Err(load_error) => {
                    cells.record_renew_error(&load_error.to_string());
                    cells.unload_user();
                }
            },
            Err(grant_error) => {
                let reason = grant_error.to_string();
                warn!(%reason, "silent renewal failed");
                cells.record_renew_error(&reason);
                cells.unload_user();
                if let Err(store_error) = store.clear().await {
                    warn!(%store_error, "failed to drop stale session");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use warden_domain::ProviderType;

    use super::*;
    use crate::persistence::MemorySessionStore;

    const NOW_SECS: i64 = 1_700_000_000;

    struct FrozenClock;

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(NOW_SECS, 0).unwrap()
        }
    }

    /// Sleeper that parks long enough for tests to ignore the renew task.
    struct ParkedSleeper;

    #[async_trait]
    impl Sleeper for ParkedSleeper {
        async fn sleep(&self, _duration: Duration) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    fn access_token(exp: i64) -> String {
        let payload = serde_json::json!({
            "sub": "user-1",
            "preferred_username": "jdoe",
            "email": "jdoe@example.com",
            "exp": exp,
        });
        let segment = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("h.{segment}.s")
    }

    fn provider_with_store(store: Arc<MemorySessionStore>) -> OidcSessionProvider {
        let config = ProviderConfig::new(
            "https://id.example.com",
            "main",
            "demo-client",
            "https://app.example.com/callback",
        )
        .with_provider(ProviderType::Oidc);
        OidcSessionProvider::new(config, store, Arc::new(FrozenClock), Arc::new(ParkedSleeper))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_store_initializes_unauthenticated() {
        let provider = provider_with_store(Arc::new(MemorySessionStore::new()));

        assert!(!provider.initialize().await.unwrap());
        let snapshot = provider.state().snapshot();
        assert!(snapshot.is_initialized);
        assert!(!snapshot.is_authenticated);
    }

    #[tokio::test]
    async fn persisted_valid_user_is_accepted_without_network() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .save(&StoredSession {
                access_token: Some(access_token(NOW_SECS + 3600)),
                refresh_token: "refresh".to_string(),
                id_token: None,
            })
            .await
            .unwrap();

        let provider = provider_with_store(store);
        let mut events = provider.events();

        assert!(provider.initialize().await.unwrap());

        let snapshot = provider.state().snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.token_expiration, Some((NOW_SECS + 3600) * 1000));
        assert_eq!(
            snapshot.user_profile.unwrap().username.as_deref(),
            Some("jdoe")
        );
        assert_eq!(events.try_recv().unwrap(), SessionEvent::UserLoaded);

        // Still well inside its validity: no refresh needed or attempted.
        assert!(!provider.token_expired());
        let token = provider.update_token(60).await.unwrap();
        assert_eq!(token, provider.get_token().unwrap());
    }

    #[tokio::test]
    async fn persisted_expired_user_starts_unauthenticated() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .save(&StoredSession {
                access_token: Some(access_token(NOW_SECS - 10)),
                refresh_token: "refresh".to_string(),
                id_token: None,
            })
            .await
            .unwrap();

        let provider = provider_with_store(store);

        assert!(!provider.initialize().await.unwrap());
        assert!(!provider.state().snapshot().is_authenticated);
        assert_eq!(provider.get_token(), None);
    }

    #[tokio::test]
    async fn logout_without_session_clears_state_and_emits_unloaded() {
        let store = Arc::new(MemorySessionStore::new());
        let provider = provider_with_store(store);
        provider.initialize().await.unwrap();
        let mut events = provider.events();

        provider.logout().await.unwrap();

        let snapshot = provider.state().snapshot();
        assert!(!snapshot.is_authenticated);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::UserUnloaded);
    }

    #[tokio::test]
    async fn this_variant_delegates_refresh_scheduling() {
        let provider = provider_with_store(Arc::new(MemorySessionStore::new()));
        assert!(provider.manages_own_refresh());
    }
}
