//! Environment-driven configuration
//!
//! Everything the shell needs arrives through `WARDEN_*` environment
//! variables and is frozen into a [`ProviderConfig`] before anything else
//! runs.

use thiserror::Error;
use warden_domain::{ProviderConfig, ProviderType};

const AUTHORITY: &str = "WARDEN_AUTHORITY";
const REALM: &str = "WARDEN_REALM";
const CLIENT_ID: &str = "WARDEN_CLIENT_ID";
const REDIRECT_URI: &str = "WARDEN_REDIRECT_URI";
const POST_LOGOUT_REDIRECT_URI: &str = "WARDEN_POST_LOGOUT_REDIRECT_URI";
const SCOPE: &str = "WARDEN_SCOPE";
const AUTH_PROVIDER: &str = "WARDEN_AUTH_PROVIDER";
const API_URL: &str = "WARDEN_API_URL";

/// Configuration errors surfaced at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        /// The offending variable.
        name: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Resolved shell configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Identity-provider configuration.
    pub provider: ProviderConfig,
    /// Base URL of the protected API exercised by `fetch`.
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an injectable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));

        let mut provider = ProviderConfig::new(
            require(AUTHORITY)?,
            require(REALM)?,
            require(CLIENT_ID)?,
            require(REDIRECT_URI)?,
        );

        if let Some(uri) = lookup(POST_LOGOUT_REDIRECT_URI) {
            provider = provider.with_post_logout_redirect_uri(uri);
        }
        if let Some(scope) = lookup(SCOPE) {
            provider = provider.with_scopes(scope.split_whitespace());
        }
        if let Some(kind) = lookup(AUTH_PROVIDER) {
            let kind: ProviderType = kind.parse().map_err(|message| ConfigError::Invalid {
                name: AUTH_PROVIDER,
                message,
            })?;
            provider = provider.with_provider(kind);
        }

        Ok(Self {
            provider,
            api_url: lookup(API_URL),
        })
    }
}
