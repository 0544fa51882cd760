//! Identity-provider capability trait
//!
//! The rest of the application never touches a concrete provider. Both
//! variants own the same shared [`AuthStateHandle`] and expose the same
//! lifecycle; everything provider-specific hides behind this trait.

use async_trait::async_trait;
use warden_domain::{AuthResult, UserProfile};

use crate::state::AuthStateHandle;

/// Default minimum remaining validity demanded of a token, in seconds.
pub const DEFAULT_MIN_TOKEN_VALIDITY_SECS: u32 = 60;

/// The interactive-login redirect produced by [`IdentityProvider::login`].
///
/// The host shell follows `url`; the provider echoes `state` back on the
/// callback so the two legs can be correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    /// Fully-formed authorization URL for the user agent to follow.
    pub url: String,
    /// Opaque request state echoed back on the callback.
    pub state: String,
}

/// Polymorphic identity-provider capability.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Shared session state owned by this provider.
    fn state(&self) -> &AuthStateHandle;

    /// Performs a non-interactive session check against the provider.
    ///
    /// Idempotent under concurrent invocation: while a check is in flight
    /// or once one has settled, further calls return the settled
    /// `is_authenticated` without re-running the handshake. On failure the
    /// error is recorded in the state, initialization still counts as done,
    /// and the error is returned.
    async fn initialize(&self) -> AuthResult<bool>;

    /// Initiates the interactive login flow.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::ProviderNotReady`](warden_domain::AuthError)
    /// when called before the underlying client is constructed.
    async fn login(&self, redirect_uri: Option<String>) -> AuthResult<AuthorizationRedirect>;

    /// Completes the interactive flow by exchanging the callback code.
    async fn complete_login(&self, code: &str) -> AuthResult<bool>;

    /// Terminates the provider-side session and clears local state.
    ///
    /// Local state is cleared before anything goes over the wire; consumers
    /// observe the session as unauthenticated even if the provider-side
    /// termination fails.
    async fn logout(&self) -> AuthResult<()>;

    /// Returns the current raw token, or `None` while unauthenticated.
    /// Synchronous and side-effect-free; never touches the network.
    fn get_token(&self) -> Option<String>;

    /// Ensures the token stays valid for at least `min_validity_secs`,
    /// refreshing when it would not.
    ///
    /// A rejected refresh is unrecoverable for the session: the provider
    /// forces a [`logout`](Self::logout) and then returns the rejection.
    async fn update_token(&self, min_validity_secs: u32) -> AuthResult<String>;

    /// Loads the normalized user profile, preferring local claim decoding
    /// over the provider's userinfo endpoint.
    async fn load_user_profile(&self) -> AuthResult<UserProfile>;

    /// Derived expiry of the current token against the provider's clock.
    fn token_expired(&self) -> bool;

    /// Whether the realm-level role grants include the given role.
    /// Providers without realm roles report `false`.
    fn has_realm_role(&self, _role: &str) -> bool {
        false
    }

    /// Whether the provider runs its own renewal; the poll scheduler is
    /// skipped for such providers.
    fn manages_own_refresh(&self) -> bool {
        false
    }
}
