use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of wall-clock time for the window scheduler.
///
/// `SystemClock` is used in production. Tests substitute a scripted clock so
/// window boundaries can be reached instantly and deterministically.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `deadline`. Returns immediately if it has already passed.
    /// Waking late is allowed; callers recompute targets from absolute
    /// boundaries rather than accumulating offsets.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        // Negative durations fail `to_std`, which means we're already late.
        if let Ok(remaining) = (deadline - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}
