//! OIDC wire client
//!
//! The opaque protocol capability both provider variants consume:
//! token-endpoint grants, userinfo fetch, and authorization/end-session
//! URL construction. Nothing above this module touches the wire format.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use warden_application::AuthorizationRedirect;
use warden_domain::{AuthError, AuthResult, Endpoints, ProviderConfig, TokenClaims, TokenSet, UserProfile};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Length of the generated `state` and `nonce` values.
const STATE_LENGTH: usize = 32;

/// Token endpoint success payload.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// Token endpoint error payload.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Failure of a token-endpoint grant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    /// The provider answered and said no.
    #[error("grant rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered garbage.
    #[error("grant transport failure: {0}")]
    Transport(String),
}

/// Wire client for one identity provider.
#[derive(Clone)]
pub struct OidcHttpClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    client_id: String,
    scope: String,
    post_logout_redirect_uri: Option<String>,
}

impl OidcHttpClient {
    /// Constructs the wire client from an immutable provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Initialization`] when the HTTP client cannot be
    /// built or the authorization endpoint is not a valid URL.
    pub fn new(config: &ProviderConfig) -> AuthResult<Self> {
        let endpoints = config.endpoints();
        // Catch a malformed authority at construction instead of on the
        // first login attempt.
        Url::parse(&endpoints.authorization)
            .map_err(|e| AuthError::Initialization(format!("invalid authorization endpoint: {e}")))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Initialization(e.to_string()))?;

        Ok(Self {
            http,
            endpoints,
            client_id: config.client_id.clone(),
            scope: config.scope_param(),
            post_logout_redirect_uri: config.post_logout_redirect_uri.clone(),
        })
    }

    /// The resolved endpoint set this client talks to.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchanges a refresh credential for a new token set.
    ///
    /// # Errors
    ///
    /// [`GrantError::Rejected`] when the provider refuses the credential,
    /// [`GrantError::Transport`] otherwise.
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenSet, GrantError> {
        self.token_grant(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Exchanges an authorization code for a token set.
    ///
    /// # Errors
    ///
    /// [`GrantError::Rejected`] when the provider refuses the code,
    /// [`GrantError::Transport`] otherwise.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, GrantError> {
        self.token_grant(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<TokenSet, GrantError> {
        let body = serde_urlencoded::to_string(params)
            .map_err(|e| GrantError::Transport(format!("failed to encode form: {e}")))?;

        let response = self
            .http
            .post(&self.endpoints.token)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| GrantError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GrantError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&text).map_or_else(
                |_| format!("token endpoint returned {status}"),
                |error| error.error_description.unwrap_or(error.error),
            );
            return Err(GrantError::Rejected(message));
        }

        let token_response: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| GrantError::Transport(format!("failed to parse token response: {e}")))?;

        Ok(TokenSet::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.id_token,
        ))
    }

    /// Fetches the userinfo document and normalizes it into a profile.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Network`] on transport failure or a non-2xx
    /// response.
    pub async fn fetch_userinfo(&self, access_token: &str) -> AuthResult<UserProfile> {
        let response = self
            .http
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "userinfo endpoint returned {status}"
            )));
        }

        let claims: TokenClaims = response
            .json()
            .await
            .map_err(|e| AuthError::Network(format!("failed to parse userinfo: {e}")))?;

        Ok(claims.to_profile())
    }

    /// Builds the interactive authorization redirect.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Initialization`] when the authorization
    /// endpoint is not a valid URL.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        prompt: Option<&str>,
    ) -> AuthResult<AuthorizationRedirect> {
        let mut url = Url::parse(&self.endpoints.authorization)
            .map_err(|e| AuthError::Initialization(format!("invalid authorization endpoint: {e}")))?;

        let state = random_token();
        let nonce = random_token();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scope)
                .append_pair("state", &state)
                .append_pair("nonce", &nonce);
            if let Some(prompt) = prompt {
                query.append_pair("prompt", prompt);
            }
        }

        Ok(AuthorizationRedirect {
            url: url.to_string(),
            state,
        })
    }

    /// Builds the redirect-style end-session URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Initialization`] when the end-session endpoint
    /// is not a valid URL.
    pub fn end_session_url(&self, id_token_hint: Option<&str>) -> AuthResult<String> {
        let mut url = Url::parse(&self.endpoints.end_session)
            .map_err(|e| AuthError::Initialization(format!("invalid end-session endpoint: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
            if let Some(post_logout) = &self.post_logout_redirect_uri {
                query.append_pair("post_logout_redirect_uri", post_logout);
            }
        }

        Ok(url.to_string())
    }

    /// Terminates the provider-side session directly, without a user-agent
    /// redirect, by presenting the refresh credential to the end-session
    /// endpoint.
    ///
    /// # Errors
    ///
    /// [`GrantError::Rejected`] when the provider refuses the credential
    /// (the session is usually gone already), [`GrantError::Transport`]
    /// otherwise.
    pub async fn revoke_session(&self, refresh_token: &str) -> Result<(), GrantError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        let body = serde_urlencoded::to_string(params)
            .map_err(|e| GrantError::Transport(format!("failed to encode form: {e}")))?;

        let response = self
            .http
            .post(&self.endpoints.end_session)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| GrantError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GrantError::Rejected(format!(
                "end-session endpoint returned {status}"
            )))
        }
    }
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use warden_domain::ProviderType;

    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new(
            "https://id.example.com",
            "main",
            "demo-client",
            "https://app.example.com/callback",
        )
        .with_provider(ProviderType::Keycloak)
        .with_post_logout_redirect_uri("https://app.example.com/")
    }

    #[test]
    fn authorization_url_carries_the_full_request() {
        let client = OidcHttpClient::new(&config()).unwrap();

        let redirect = client
            .authorization_url("https://app.example.com/callback", Some("login"))
            .unwrap();

        let url = Url::parse(&redirect.url).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(url.as_str().starts_with(
            "https://id.example.com/realms/main/protocol/openid-connect/auth?"
        ));
        assert!(pairs.contains(&("client_id".to_string(), "demo-client".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "openid profile".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "login".to_string())));
        assert!(pairs.iter().any(|(k, v)| k == "state" && v == &redirect.state));
        assert!(pairs.iter().any(|(k, _)| k == "nonce"));
    }

    #[test]
    fn generated_state_values_are_fresh_per_redirect() {
        let client = OidcHttpClient::new(&config()).unwrap();

        let first = client.authorization_url("https://cb", None).unwrap();
        let second = client.authorization_url("https://cb", None).unwrap();

        assert_eq!(first.state.len(), 32);
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn end_session_url_includes_hint_and_post_logout_target() {
        let client = OidcHttpClient::new(&config()).unwrap();

        let url = client.end_session_url(Some("id-token")).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(pairs.contains(&("id_token_hint".to_string(), "id-token".to_string())));
        assert!(pairs.contains(&(
            "post_logout_redirect_uri".to_string(),
            "https://app.example.com/".to_string()
        )));
    }

    #[test]
    fn construction_rejects_a_malformed_authority() {
        let config = ProviderConfig::new("not a url", "main", "client", "https://cb");
        assert!(matches!(
            OidcHttpClient::new(&config),
            Err(AuthError::Initialization(_))
        ));
    }

    #[test]
    fn token_response_parses_with_optional_fields_absent() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.refresh_token, None);
        assert_eq!(parsed.id_token, None);
    }

    #[test]
    fn token_error_response_prefers_the_description() {
        let parsed: TokenErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Session not active"}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.error_description.unwrap_or(parsed.error),
            "Session not active"
        );
    }
}
