//! Compact token decoding and session token types
//!
//! Tokens are treated as opaque credentials except for their claims
//! segment: expiry and profile fields are read straight out of the payload
//! so the session never needs a userinfo round-trip for data it already
//! holds. Signature verification belongs to the issuing provider and the
//! resource servers, not to this client.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::profile::UserProfile;

/// Realm-level role grants carried in Keycloak-style tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct RealmAccess {
    /// Role names granted at the realm level.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims read from the payload segment of a compact token.
///
/// Every field is optional in the wire format; absent fields deserialize to
/// their defaults so a sparse token still decodes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct TokenClaims {
    /// Subject identifier.
    #[serde(default)]
    pub sub: String,
    /// Preferred username claim.
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Plain username claim, used when `preferred_username` is absent.
    #[serde(default)]
    pub username: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Realm-level role grants.
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

impl TokenClaims {
    /// Absolute token expiry in epoch milliseconds, when the token carries
    /// an `exp` claim.
    #[must_use]
    pub fn expiration_millis(&self) -> Option<i64> {
        self.exp.map(|exp| exp.saturating_mul(1000))
    }

    /// Normalizes the profile-bearing claims into a [`UserProfile`].
    #[must_use]
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.sub.clone(),
            username: self
                .preferred_username
                .clone()
                .or_else(|| self.username.clone())
                .or_else(|| self.email.clone()),
            email: self.email.clone(),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
        }
    }

    /// Whether the realm-level grants include the given role.
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access
            .as_ref()
            .is_some_and(|access| access.roles.iter().any(|r| r == role))
    }
}

/// Decodes the claims segment of a compact three-segment token.
///
/// The payload segment is base64url without padding; no signature check is
/// performed here.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] when the token is not three
/// dot-separated segments, the payload is not valid base64url, or the
/// decoded payload is not a JSON claims object.
pub fn decode_claims(token: &str) -> AuthResult<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(AuthError::InvalidToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not a claims object: {e}")))
}

/// The set of tokens held for a live session.
///
/// Expiry is never stored alongside the tokens; it is recomputed from the
/// access token's own claims whenever needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// The raw access token presented as a bearer credential.
    pub access_token: String,
    /// Refresh credential, when the grant issued one.
    pub refresh_token: Option<String>,
    /// ID token, used as a hint on provider-side logout.
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Creates a token set from a grant response.
    #[must_use]
    pub const fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            id_token,
        }
    }

    /// Decodes the access token's claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the access token cannot be
    /// decoded.
    pub fn claims(&self) -> AuthResult<TokenClaims> {
        decode_claims(&self.access_token)
    }

    /// Absolute expiry of the access token in epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the access token cannot be
    /// decoded or carries no `exp` claim; a session without a knowable
    /// expiry is never installed.
    pub fn expiration_millis(&self) -> AuthResult<i64> {
        self.claims()?
            .expiration_millis()
            .ok_or_else(|| AuthError::InvalidToken("token carries no exp claim".to_string()))
    }
}

/// Persisted session shape, the durable analog of a browser session store.
///
/// Only what the silent session check needs survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Last issued access token, when the store holds a full user entry.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Refresh credential replayed by the silent session check.
    pub refresh_token: String,
    /// ID token hint for provider-side logout.
    #[serde(default)]
    pub id_token: Option<String>,
}

impl StoredSession {
    /// Builds the persisted shape from a live token set, or `None` when the
    /// grant issued no refresh credential (nothing worth persisting).
    #[must_use]
    pub fn from_tokens(tokens: &TokenSet) -> Option<Self> {
        tokens.refresh_token.as_ref().map(|refresh| Self {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: refresh.clone(),
            id_token: tokens.id_token.clone(),
        })
    }

    /// Reconstructs a token set from the persisted shape, when a usable
    /// access token was stored.
    #[must_use]
    pub fn to_tokens(&self) -> Option<TokenSet> {
        self.access_token.as_ref().map(|access| TokenSet {
            access_token: access.clone(),
            refresh_token: Some(self.refresh_token.clone()),
            id_token: self.id_token.clone(),
        })
    }
}
