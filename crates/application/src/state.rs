//! Shared observable session state

use std::sync::Arc;

use tokio::sync::watch;
use warden_domain::AuthState;

use crate::ports::Clock;

/// Shared handle to the process-wide [`AuthState`].
///
/// The state lives inside a watch channel: mutations go through
/// [`update`](Self::update) and are published atomically, consumers either
/// take [`snapshot`](Self::snapshot)s or [`subscribe`](Self::subscribe) for
/// change notification. Only the identity provider and the facade mutate;
/// every other component treats the state as read-only.
#[derive(Debug, Clone)]
pub struct AuthStateHandle {
    tx: Arc<watch::Sender<AuthState>>,
}

impl AuthStateHandle {
    /// Creates a handle over a default (uninitialized) state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(AuthState::default())),
        }
    }

    /// Returns a point-in-time copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Registers for change notification.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Applies a mutation and notifies subscribers.
    pub fn update(&self, mutate: impl FnOnce(&mut AuthState)) {
        self.tx.send_modify(mutate);
    }

    /// Derived expiry check against the given clock.
    #[must_use]
    pub fn token_expired(&self, clock: &dyn Clock) -> bool {
        self.snapshot().token_expired(clock.now_millis())
    }
}

impl Default for AuthStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshots_are_point_in_time_copies() {
        let handle = AuthStateHandle::new();
        let before = handle.snapshot();

        handle.update(|state| state.is_authenticated = true);

        assert!(!before.is_authenticated);
        assert!(handle.snapshot().is_authenticated);
    }

    #[tokio::test]
    async fn subscribers_observe_updates() {
        let handle = AuthStateHandle::new();
        let mut receiver = handle.subscribe();

        handle.update(|state| state.is_authenticated = true);

        receiver.changed().await.unwrap();
        assert!(receiver.borrow().is_authenticated);
    }

    #[test]
    fn clones_share_the_same_state() {
        let handle = AuthStateHandle::new();
        let other = handle.clone();

        handle.update(|state| state.token_expiration = Some(42));

        assert_eq!(other.snapshot().token_expiration, Some(42));
    }
}
