//! Tokio timer adapter

use std::time::Duration;

use async_trait::async_trait;
use warden_application::ports::Sleeper;

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl TokioSleeper {
    /// Creates a new tokio-backed sleeper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_suspends_for_the_requested_duration() {
        let sleeper = TokioSleeper::new();
        let before = std::time::Instant::now();
        sleeper.sleep(Duration::from_millis(20)).await;
        assert!(before.elapsed() >= Duration::from_millis(20));
    }
}
