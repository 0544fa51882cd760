//! Observable authentication session state
//!
//! One [`AuthState`] record exists per process. It is mutated only by the
//! identity provider and the facade; every other component reads snapshots
//! of it. Expiry is never stored as a boolean: it is derived from
//! `token_expiration` against a caller-supplied "now" on every read.

use crate::error::AuthError;
use crate::profile::UserProfile;

/// Progress of the user-profile load path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileLoadStatus {
    /// No load has been requested.
    #[default]
    Idle,
    /// An attempt is in flight (1-based attempt number).
    Attempting {
        /// The 1-based attempt number.
        attempt: u32,
    },
    /// Waiting out the backoff delay before the next attempt.
    Retrying {
        /// The delay being waited out, in milliseconds.
        delay_ms: u64,
    },
    /// The profile is loaded and cached.
    Success,
    /// Every attempt failed; no profile is cached.
    Failed,
}

impl ProfileLoadStatus {
    /// Whether the load path has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// The single mutable record describing session status.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    /// True iff a usable token is currently held.
    pub is_authenticated: bool,
    /// Initialization has settled (possibly as "not authenticated").
    pub is_initialized: bool,
    /// An initialization handshake is in flight. Mutually exclusive with
    /// `is_initialized`.
    pub initializing: bool,
    /// Cached normalized profile of the authenticated user.
    pub user_profile: Option<UserProfile>,
    /// Last fatal error from init/login/logout/refresh.
    pub auth_error: Option<AuthError>,
    /// Absolute expiry of the current access token, epoch milliseconds,
    /// derived solely from the token's own claims.
    pub token_expiration: Option<i64>,
    /// Retry count of the most recent profile load.
    pub profile_load_retries: u32,
    /// Retry budget for the profile load path.
    pub max_profile_load_retries: u32,
    /// Progress of the profile load path.
    pub profile_load_status: ProfileLoadStatus,
}

impl AuthState {
    /// Default retry budget for the profile load path.
    pub const DEFAULT_MAX_PROFILE_LOAD_RETRIES: u32 = 3;

    /// Pure derived expiry check: expired when no expiration is known or
    /// the expiration is not in the future.
    #[must_use]
    pub fn token_expired(&self, now_millis: i64) -> bool {
        self.token_expiration.is_none_or(|exp| exp <= now_millis)
    }

    /// Drops everything tied to the live session. Initialization flags are
    /// untouched: a logged-out session is still an initialized one.
    pub fn clear_session(&mut self) {
        self.is_authenticated = false;
        self.user_profile = None;
        self.token_expiration = None;
        self.profile_load_retries = 0;
        self.profile_load_status = ProfileLoadStatus::Idle;
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            is_authenticated: false,
            is_initialized: false,
            initializing: false,
            user_profile: None,
            auth_error: None,
            token_expiration: None,
            profile_load_retries: 0,
            max_profile_load_retries: Self::DEFAULT_MAX_PROFILE_LOAD_RETRIES,
            profile_load_status: ProfileLoadStatus::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOW_MS: i64 = 1_700_000_000_000;

    #[test]
    fn token_expired_is_true_without_expiration() {
        let state = AuthState::default();
        assert!(state.token_expired(NOW_MS));
    }

    #[test]
    fn token_expired_matches_past_and_future_instants() {
        let mut state = AuthState::default();

        // Ten seconds in the past.
        state.token_expiration = Some(NOW_MS - 10_000);
        assert!(state.token_expired(NOW_MS));

        // Exactly now counts as expired.
        state.token_expiration = Some(NOW_MS);
        assert!(state.token_expired(NOW_MS));

        // One hour in the future.
        state.token_expiration = Some(NOW_MS + 3_600_000);
        assert!(!state.token_expired(NOW_MS));
    }

    #[test]
    fn clear_session_keeps_initialization_flags() {
        let mut state = AuthState {
            is_authenticated: true,
            is_initialized: true,
            user_profile: Some(UserProfile::default()),
            token_expiration: Some(NOW_MS),
            profile_load_retries: 2,
            profile_load_status: ProfileLoadStatus::Success,
            ..AuthState::default()
        };

        state.clear_session();

        assert!(!state.is_authenticated);
        assert!(state.is_initialized);
        assert_eq!(state.user_profile, None);
        assert_eq!(state.token_expiration, None);
        assert_eq!(state.profile_load_status, ProfileLoadStatus::Idle);
    }

    #[test]
    fn profile_load_status_terminal_states() {
        assert!(ProfileLoadStatus::Success.is_terminal());
        assert!(ProfileLoadStatus::Failed.is_terminal());
        assert!(!ProfileLoadStatus::Idle.is_terminal());
        assert!(!ProfileLoadStatus::Attempting { attempt: 1 }.is_terminal());
        assert!(!ProfileLoadStatus::Retrying { delay_ms: 1000 }.is_terminal());
    }
}
