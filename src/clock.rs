use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Source of monotonic time and the way to wait on it.
///
/// The poll loop never touches the runtime timer directly, so that tests can drive it
/// without actually sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);

    /// Wait until the clock reaches `deadline`.
    async fn sleep_until(&self, deadline: Instant);
}

/// Real time, backed by the Tokio timer.
#[derive(Copy, Clone, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline.into()).await;
    }
}
