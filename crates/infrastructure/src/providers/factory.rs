//! Provider selection
//!
//! One factory keyed by the configured provider type. Exactly one provider
//! instance comes out of it per process; the facade wraps it and call
//! sites never learn which variant they got.

use std::sync::Arc;

use warden_application::ports::{Clock, SessionStore, Sleeper};
use warden_application::{AuthService, IdentityProvider};
use warden_domain::{AuthResult, ProviderConfig, ProviderType};

use crate::adapters::{SystemClock, TokioSleeper};
use crate::persistence::FileSessionStore;
use crate::providers::{KeycloakProvider, OidcSessionProvider};

/// Shared collaborators injected into providers.
pub struct ProviderDeps {
    /// Durable session persistence.
    pub session_store: Arc<dyn SessionStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Delay source.
    pub sleeper: Arc<dyn Sleeper>,
}

impl ProviderDeps {
    /// Production wiring: system clock, tokio timer, and a file-backed
    /// session store under the platform data directory (falling back to
    /// the working directory when the platform offers none).
    #[must_use]
    pub fn production(app_name: &str) -> Self {
        let session_store = FileSessionStore::in_user_data_dir(app_name)
            .unwrap_or_else(|| FileSessionStore::new(format!("{app_name}-session.json").into()));
        Self {
            session_store: Arc::new(session_store),
            clock: Arc::new(SystemClock::new()),
            sleeper: Arc::new(TokioSleeper::new()),
        }
    }
}

/// Constructs the configured identity provider.
///
/// # Errors
///
/// Propagates the provider's construction failure (a malformed authority,
/// for the OIDC variant).
pub fn build_provider(
    config: ProviderConfig,
    deps: ProviderDeps,
) -> AuthResult<Arc<dyn IdentityProvider>> {
    match config.provider {
        ProviderType::Keycloak => Ok(Arc::new(KeycloakProvider::new(
            config,
            deps.session_store,
            deps.clock,
            deps.sleeper,
        ))),
        ProviderType::Oidc => Ok(Arc::new(OidcSessionProvider::new(
            config,
            deps.session_store,
            deps.clock,
            deps.sleeper,
        )?)),
    }
}

/// Constructs the provider and wraps it in the [`AuthService`] facade.
///
/// # Errors
///
/// See [`build_provider`].
pub fn build_auth_service(config: ProviderConfig, deps: ProviderDeps) -> AuthResult<AuthService> {
    let sleeper = Arc::clone(&deps.sleeper);
    let provider = build_provider(config, deps)?;
    Ok(AuthService::new(provider, sleeper))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemorySessionStore;

    fn deps() -> ProviderDeps {
        ProviderDeps {
            session_store: Arc::new(MemorySessionStore::new()),
            clock: Arc::new(SystemClock::new()),
            sleeper: Arc::new(TokioSleeper::new()),
        }
    }

    #[test]
    fn default_configuration_selects_keycloak() {
        let config = ProviderConfig::new("https://id.example.com", "main", "client", "app://cb");
        let provider = build_provider(config, deps()).unwrap();
        assert!(!provider.manages_own_refresh());
    }

    #[test]
    fn oidc_configuration_selects_the_self_renewing_variant() {
        let config = ProviderConfig::new("https://id.example.com", "main", "client", "app://cb")
            .with_provider(ProviderType::Oidc);
        let provider = build_provider(config, deps()).unwrap();
        assert!(provider.manages_own_refresh());
    }
}
