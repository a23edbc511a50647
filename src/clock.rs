//! Injected time source.
//!
//! The collection window and the per-agent response timeout both sleep through this trait
//! instead of calling `tokio::time::sleep` directly, so tests can swap in a clock that resolves
//! immediately without `tokio::time::pause()` bleeding into unrelated timers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time, used to stamp `ConversationMessage::recorded_at`.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The real clock, backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test-only clock implementations, exposed publicly (rather than gated on `#[cfg(test)]`) so
/// the integration tests under `tests/` can depend on them too.
pub mod testing {
    use super::*;

    /// A clock that never makes the caller wait — used by tests that want the collection
    /// window and response timeout to resolve without slowing the suite down.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct InstantClock;

    #[async_trait]
    impl Clock for InstantClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }

        async fn sleep(&self, _duration: Duration) {
            tokio::task::yield_now().await;
        }
    }
}
