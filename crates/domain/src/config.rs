//! Provider configuration and endpoint derivation
//!
//! Configuration is supplied once at provider construction and immutable
//! thereafter. Endpoints follow the realm-scoped layout
//! `{authority}/realms/{realm}/protocol/openid-connect/{...}` unless every
//! URL is supplied explicitly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which identity-provider integration to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Keycloak-specific integration with realm roles and refresh polling.
    #[default]
    Keycloak,
    /// Generic OIDC integration with self-managed silent renewal.
    Oidc,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keycloak => write!(f, "keycloak"),
            Self::Oidc => write!(f, "oidc"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keycloak" => Ok(Self::Keycloak),
            "oidc" => Ok(Self::Oidc),
            other => Err(format!("unknown provider type: {other}")),
        }
    }
}

/// Resolved endpoint set for an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Token issuer identifier.
    pub issuer: String,
    /// Interactive authorization endpoint.
    pub authorization: String,
    /// Token grant endpoint.
    pub token: String,
    /// Userinfo endpoint.
    pub userinfo: String,
    /// End-session (logout) endpoint.
    pub end_session: String,
}

impl Endpoints {
    /// Derives the endpoint set from a realm-scoped authority layout.
    #[must_use]
    pub fn for_realm(authority: &str, realm: &str) -> Self {
        let base = format!("{}/realms/{realm}", authority.trim_end_matches('/'));
        Self {
            issuer: base.clone(),
            authorization: format!("{base}/protocol/openid-connect/auth"),
            token: format!("{base}/protocol/openid-connect/token"),
            userinfo: format!("{base}/protocol/openid-connect/userinfo"),
            end_session: format!("{base}/protocol/openid-connect/logout"),
        }
    }
}

/// Immutable identity-provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which integration to construct.
    pub provider: ProviderType,
    /// Authority base URL of the identity provider.
    pub authority: String,
    /// Realm (tenant) name.
    pub realm: String,
    /// Client identifier registered with the provider.
    pub client_id: String,
    /// Redirect URI for the interactive login flow.
    pub redirect_uri: String,
    /// Where the provider sends the user agent after logout.
    pub post_logout_redirect_uri: Option<String>,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Explicit endpoint overrides; derived from the realm layout when
    /// absent.
    pub endpoint_overrides: Option<Endpoints>,
}

impl ProviderConfig {
    /// Creates a configuration with default scopes (`openid profile`) and
    /// the default provider type.
    #[must_use]
    pub fn new(
        authority: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: ProviderType::default(),
            authority: authority.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            post_logout_redirect_uri: None,
            scopes: default_scopes(),
            endpoint_overrides: None,
        }
    }

    /// Selects the provider integration.
    #[must_use]
    pub const fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the post-logout redirect URI.
    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Replaces the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Supplies every endpoint explicitly instead of deriving them.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoint_overrides = Some(endpoints);
        self
    }

    /// The effective endpoint set.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        self.endpoint_overrides
            .clone()
            .unwrap_or_else(|| Endpoints::for_realm(&self.authority, &self.realm))
    }

    /// Space-joined scope parameter for wire requests.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// The default requested scopes.
#[must_use]
pub fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}
