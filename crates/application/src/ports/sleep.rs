//! Delay port for retry backoff and scheduling

use std::time::Duration;

use async_trait::async_trait;

/// Port for suspending the current task.
///
/// Backoff delays and the refresh poll period go through this seam, so
/// tests observe the requested durations instead of waiting them out.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current task for the given duration.
    async fn sleep(&self, duration: Duration);
}
