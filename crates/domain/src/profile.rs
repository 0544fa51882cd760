//! Normalized user profile

use serde::{Deserialize, Serialize};

/// A normalized view of the authenticated user.
///
/// Extracted either from decoded token claims or from the provider's
/// userinfo endpoint; both sources map onto this one shape so consumers
/// never see provider-specific payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    /// Subject identifier.
    pub id: String,
    /// Preferred username, when the provider supplied one.
    pub username: Option<String>,
    /// Email address, when released by the granted scopes.
    pub email: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Display name for UI surfaces: username, falling back to email,
    /// falling back to the subject id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_name_falls_back_to_email_then_id() {
        let mut profile = UserProfile {
            id: "abc-123".to_string(),
            username: Some("jdoe".to_string()),
            email: Some("jdoe@example.com".to_string()),
            ..UserProfile::default()
        };
        assert_eq!(profile.display_name(), "jdoe");

        profile.username = None;
        assert_eq!(profile.display_name(), "jdoe@example.com");

        profile.email = None;
        assert_eq!(profile.display_name(), "abc-123");
    }
}
