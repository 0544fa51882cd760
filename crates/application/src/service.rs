//! Authentication facade
//!
//! The single surface the rest of the application talks to. It holds
//! exactly one active provider and adds no state of its own; call sites
//! stay untouched when the concrete provider variant is swapped.

use std::sync::Arc;
use std::time::Duration;

use warden_domain::{AuthResult, AuthState, UserProfile};

use crate::ports::Sleeper;
use crate::provider::{
    AuthorizationRedirect, DEFAULT_MIN_TOKEN_VALIDITY_SECS, IdentityProvider,
};
use crate::scheduler::{RefreshHandle, TokenRefreshScheduler};
use crate::state::AuthStateHandle;

/// Facade over the active [`IdentityProvider`].
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    sleeper: Arc<dyn Sleeper>,
    scheduler: TokenRefreshScheduler,
}

impl AuthService {
    /// Creates the facade around an already-constructed provider.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            provider,
            sleeper,
            scheduler: TokenRefreshScheduler::new(),
        }
    }

    /// Overrides the background refresh poll period.
    #[must_use]
    pub const fn with_refresh_period(mut self, period: Duration) -> Self {
        self.scheduler = TokenRefreshScheduler::with_period(period);
        self
    }

    /// Read view of the shared session state.
    #[must_use]
    pub fn state(&self) -> &AuthStateHandle {
        self.provider.state()
    }

    /// Point-in-time copy of the session state.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.provider.state().snapshot()
    }

    /// Derived expiry of the current token.
    #[must_use]
    pub fn token_expired(&self) -> bool {
        self.provider.token_expired()
    }

    /// See [`IdentityProvider::initialize`].
    ///
    /// # Errors
    ///
    /// Propagates the provider's initialization failure.
    pub async fn initialize(&self) -> AuthResult<bool> {
        self.provider.initialize().await
    }

    /// See [`IdentityProvider::login`].
    ///
    /// # Errors
    ///
    /// Propagates the provider's readiness or construction failure.
    pub async fn login(&self, redirect_uri: Option<String>) -> AuthResult<AuthorizationRedirect> {
        self.provider.login(redirect_uri).await
    }

    /// See [`IdentityProvider::complete_login`].
    ///
    /// # Errors
    ///
    /// Propagates the code-exchange failure.
    pub async fn complete_login(&self, code: &str) -> AuthResult<bool> {
        self.provider.complete_login(code).await
    }

    /// See [`IdentityProvider::logout`].
    ///
    /// # Errors
    ///
    /// Propagates provider-side termination failures; local state is
    /// cleared regardless.
    pub async fn logout(&self) -> AuthResult<()> {
        self.provider.logout().await
    }

    /// See [`IdentityProvider::get_token`].
    #[must_use]
    pub fn get_token(&self) -> Option<String> {
        self.provider.get_token()
    }

    /// Refreshes with the default minimum-validity horizon.
    ///
    /// # Errors
    ///
    /// Propagates the refresh rejection; the session has already been
    /// ended when it does.
    pub async fn update_token(&self) -> AuthResult<String> {
        self.provider
            .update_token(DEFAULT_MIN_TOKEN_VALIDITY_SECS)
            .await
    }

    /// Refreshes with an explicit minimum-validity horizon in seconds.
    ///
    /// # Errors
    ///
    /// Propagates the refresh rejection.
    pub async fn update_token_with_validity(&self, min_validity_secs: u32) -> AuthResult<String> {
        self.provider.update_token(min_validity_secs).await
    }

    /// See [`IdentityProvider::load_user_profile`].
    ///
    /// # Errors
    ///
    /// Propagates the exhausted-retries failure.
    pub async fn load_user_profile(&self) -> AuthResult<UserProfile> {
        self.provider.load_user_profile().await
    }

    /// See [`IdentityProvider::has_realm_role`].
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.provider.has_realm_role(role)
    }

    /// Installs the background refresh policy.
    ///
    /// Returns an inert handle when the provider manages its own renewal;
    /// the owner invokes the handle on teardown either way.
    #[must_use]
    pub fn setup_token_refresh(&self) -> RefreshHandle {
        if self.provider.manages_own_refresh() {
            return RefreshHandle::inert();
        }
        self.scheduler
            .start(Arc::clone(&self.provider), Arc::clone(&self.sleeper))
    }
}
