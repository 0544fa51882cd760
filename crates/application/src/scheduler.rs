//! Background token refresh
//!
//! One repeating task per session keeps the access token inside its
//! validity horizon. The task owns nothing: it reads the shared state and
//! calls back into the provider, so it ends itself the moment the session
//! does.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ports::Sleeper;
use crate::provider::{DEFAULT_MIN_TOKEN_VALIDITY_SECS, IdentityProvider};

/// Handle to a running refresh task.
///
/// The owner retains this and invokes [`cancel`](Self::cancel) on teardown;
/// dropping the handle leaves the task running until its own exit
/// conditions fire.
#[derive(Debug)]
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// A handle with no task behind it, for providers that manage their own
    /// renewal.
    #[must_use]
    pub const fn inert() -> Self {
        Self { task: None }
    }

    /// Whether a task is still running behind this handle.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the refresh task.
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Awaits the task's natural termination (session ended or refresh
    /// rejected). Useful for graceful shutdown and tests.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Periodic background task keeping the session token fresh.
#[derive(Debug, Clone, Copy)]
pub struct TokenRefreshScheduler {
    period: Duration,
}

impl TokenRefreshScheduler {
    /// Default poll period.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

    /// Creates a scheduler with the default period.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
        }
    }

    /// Creates a scheduler with a custom poll period.
    #[must_use]
    pub const fn with_period(period: Duration) -> Self {
        Self { period }
    }

    /// Starts the poll loop.
    ///
    /// Each tick checks `is_authenticated` and self-cancels when the
    /// session has ended; otherwise it refreshes. The first refresh
    /// rejection (which already forced a logout inside the provider) also
    /// ends the loop.
    pub fn start(
        &self,
        provider: Arc<dyn IdentityProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> RefreshHandle {
        let period = self.period;
        let task = tokio::spawn(async move {
            loop {
                sleeper.sleep(period).await;

                if !provider.state().snapshot().is_authenticated {
                    debug!("refresh loop stopping: session ended");
                    break;
                }

                if let Err(error) = provider.update_token(DEFAULT_MIN_TOKEN_VALIDITY_SECS).await {
                    warn!(%error, "background token refresh failed, stopping");
                    break;
                }
            }
        });

        RefreshHandle { task: Some(task) }
    }
}

impl Default for TokenRefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inert_handle_is_never_active() {
        let handle = RefreshHandle::inert();
        assert!(!handle.is_active());
        handle.cancel();
    }
}
