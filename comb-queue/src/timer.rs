//! Wake-up hint for the delayed-job promoter.
//!
//! Promotion itself happens elsewhere; the queue only tells the promoter the
//! earliest delay it has seen so it can wake in time. Scheduling never blocks
//! and never fails.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

/// Coalescing "wake no later than" timer hint.
#[derive(Debug, Default)]
pub struct DelayedTimer {
    next_wake: Mutex<Option<i64>>,
    notify: Notify,
}

impl DelayedTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the promoter to wake no later than `at` (ms since epoch).
    ///
    /// Later instants than the one already pending are ignored.
    pub fn schedule(&self, at: i64) {
        let mut next = self.next_wake.lock();
        if next.is_some_and(|current| current <= at) {
            return;
        }
        *next = Some(at);
        drop(next);

        trace!(wake_at = at, "Delayed timer rescheduled");
        self.notify.notify_one();
    }

    /// Earliest pending wake-up instant.
    pub fn next_wake(&self) -> Option<i64> {
        *self.next_wake.lock()
    }

    /// Take the pending instant, leaving the timer idle.
    pub fn take(&self) -> Option<i64> {
        self.next_wake.lock().take()
    }

    /// Wait until a sooner wake-up is scheduled.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_schedule_keeps_soonest() {
        let timer = DelayedTimer::new();
        timer.schedule(2_000);
        timer.schedule(3_000);
        assert_eq!(timer.next_wake(), Some(2_000));

        timer.schedule(1_000);
        assert_eq!(timer.next_wake(), Some(1_000));
    }

    #[test]
    fn test_take_resets() {
        let timer = DelayedTimer::new();
        timer.schedule(5);
        assert_eq!(timer.take(), Some(5));
        assert_eq!(timer.next_wake(), None);

        timer.schedule(10);
        assert_eq!(timer.next_wake(), Some(10));
    }

    #[tokio::test]
    async fn test_notified_wakes_waiter() {
        let timer = Arc::new(DelayedTimer::new());
        let waiter = {
            let timer = timer.clone();
            tokio::spawn(async move { timer.notified().await })
        };

        timer.schedule(1_000);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }
}
