//! User-profile loading with bounded retry and backoff
//!
//! The profile path is the fragile one: userinfo endpoints sit behind
//! cross-origin rules and sporadic provider hiccups. The loader therefore
//! prefers decoding the claims it already holds, and only then falls back
//! to the remote call, retrying with exponential backoff before giving up.

use std::future::Future;

use tracing::{debug, warn};
use warden_domain::{AuthError, AuthResult, ProfileLoadStatus, UserProfile, decode_claims};

use crate::ports::Sleeper;
use crate::state::AuthStateHandle;

/// Loads the user profile: memoized → local claims decode → remote fetch
/// with bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct ProfileLoader {
    max_retries: u32,
}

impl ProfileLoader {
    /// Creates a loader with the default retry budget.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: warden_domain::AuthState::DEFAULT_MAX_PROFILE_LOAD_RETRIES,
        }
    }

    /// Creates a loader with a custom retry budget.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Backoff before retry `n` (0-based): 1s, 2s, 4s, ...
    const fn backoff_millis(retry: u32) -> u64 {
        1000_u64 << retry
    }

    /// Runs the load state machine.
    ///
    /// `token` is the current access token for local decoding;
    /// `fetch_remote` performs one userinfo call per invocation. The loader
    /// caches the resolved profile in `state` and never caches a partial
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProfileLoad`] once the remote path has failed
    /// `max_retries + 1` times.
    pub async fn load<F, Fut>(
        &self,
        state: &AuthStateHandle,
        token: Option<&str>,
        fetch_remote: F,
        sleeper: &dyn Sleeper,
    ) -> AuthResult<UserProfile>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<UserProfile>> + Send,
    {
        if let Some(profile) = state.snapshot().user_profile {
            return Ok(profile);
        }

        let max_retries = self.max_retries;
        let mut attempt: u32 = 0;
        loop {
            state.update(|s| {
                s.profile_load_retries = attempt;
                s.max_profile_load_retries = max_retries;
                s.profile_load_status = ProfileLoadStatus::Attempting {
                    attempt: attempt + 1,
                };
            });

            if let Some(token) = token {
                match decode_claims(token) {
                    Ok(claims) => {
                        let profile = claims.to_profile();
                        Self::cache(state, &profile);
                        return Ok(profile);
                    }
                    Err(error) => {
                        debug!(%error, "claims decode failed, falling back to userinfo");
                    }
                }
            }

            match fetch_remote().await {
                Ok(profile) => {
                    Self::cache(state, &profile);
                    return Ok(profile);
                }
                Err(error) if attempt < max_retries => {
                    let delay_ms = Self::backoff_millis(attempt);
                    warn!(
                        attempt = attempt + 1,
                        %error,
                        delay_ms,
                        "profile fetch failed, retrying"
                    );
                    state.update(|s| {
                        s.profile_load_status = ProfileLoadStatus::Retrying { delay_ms };
                    });
                    sleeper
                        .sleep(std::time::Duration::from_millis(delay_ms))
                        .await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(%error, "profile fetch failed, retries exhausted");
                    state.update(|s| s.profile_load_status = ProfileLoadStatus::Failed);
                    return Err(AuthError::ProfileLoad(error.to_string()));
                }
            }
        }
    }

    fn cache(state: &AuthStateHandle, profile: &UserProfile) {
        state.update(|s| {
            s.user_profile = Some(profile.clone());
            s.profile_load_status = ProfileLoadStatus::Success;
        });
    }
}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Sleeper that returns immediately and records the requested delays.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn recorded_millis(&self) -> Vec<u64> {
            self.delays
                .lock()
                .unwrap()
                .iter()
                .map(|d| u64::try_from(d.as_millis()).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn decodable_token() -> String {
        let payload = serde_json::json!({
            "sub": "user-1",
            "preferred_username": "jdoe",
            "email": "jdoe@example.com",
            "given_name": "Jane",
            "family_name": "Doe",
            "exp": 1_700_000_000,
        });
        let segment = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("h.{segment}.s")
    }

    fn remote_profile() -> UserProfile {
        UserProfile {
            id: "user-1".to_string(),
            username: Some("remote".to_string()),
            ..UserProfile::default()
        }
    }

    #[tokio::test]
    async fn decodable_token_resolves_without_remote_call() {
        let state = AuthStateHandle::new();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let token = decodable_token();

        let profile = ProfileLoader::new()
            .load(
                &state,
                Some(&token),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(remote_profile()) }
                },
                &sleeper,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(profile.username.as_deref(), Some("jdoe"));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.profile_load_status, ProfileLoadStatus::Success);
        assert_eq!(snapshot.user_profile, Some(profile));
    }

    #[tokio::test]
    async fn undecodable_token_falls_back_to_remote_once() {
        let state = AuthStateHandle::new();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let profile = ProfileLoader::new()
            .load(
                &state,
                Some("not-a-token"),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(remote_profile()) }
                },
                &sleeper,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(profile.username.as_deref(), Some("remote"));
        assert!(sleeper.recorded_millis().is_empty());
    }

    #[tokio::test]
    async fn persistent_remote_failure_retries_with_backoff_then_fails() {
        let state = AuthStateHandle::new();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = ProfileLoader::new()
            .load(
                &state,
                None,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(AuthError::Network("userinfo down".to_string())) }
                },
                &sleeper,
            )
            .await;

        assert!(matches!(result, Err(AuthError::ProfileLoad(_))));
        // Initial attempt plus three retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.recorded_millis(), vec![1000, 2000, 4000]);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.profile_load_status, ProfileLoadStatus::Failed);
        assert_eq!(snapshot.profile_load_retries, 3);
        assert_eq!(snapshot.user_profile, None);
    }

    #[tokio::test]
    async fn recovery_on_second_attempt_caches_the_profile() {
        let state = AuthStateHandle::new();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let profile = ProfileLoader::new()
            .load(
                &state,
                None,
                || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call == 0 {
                            Err(AuthError::Network("blip".to_string()))
                        } else {
                            Ok(remote_profile())
                        }
                    }
                },
                &sleeper,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.recorded_millis(), vec![1000]);
        assert_eq!(state.snapshot().user_profile, Some(profile));
    }

    #[tokio::test]
    async fn cached_profile_short_circuits() {
        let state = AuthStateHandle::new();
        let cached = remote_profile();
        state.update(|s| s.user_profile = Some(cached.clone()));
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let profile = ProfileLoader::new()
            .load(
                &state,
                None,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(AuthError::Network("unreachable".to_string())) }
                },
                &sleeper,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(profile, cached);
    }
}
