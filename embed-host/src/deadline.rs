//! Single-shot, cancelable deadline timer.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// Pending timer, or nothing once it fired or was cancelled.
#[derive(Debug)]
pub struct Deadline {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    /// Start counting now.
    pub fn start(duration: Duration) -> Self {
        Self {
            sleep: Some(Box::pin(sleep(duration))),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.sleep.is_some()
    }

    /// When the timer will fire, if it still can.
    pub fn expires_at(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|s| s.deadline())
    }

    /// Cancel the timer. Cancelling a fired or cancelled timer is a no-op.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    /// Resolves once, when the timer fires. Never resolves after firing or
    /// cancellation. Safe to drop mid-wait (e.g. in `select!`); the timer keeps
    /// its original expiry.
    pub async fn elapsed(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let mut deadline = Deadline::start(Duration::from_millis(5000));
        assert!(timeout(Duration::from_millis(4999), deadline.elapsed())
            .await
            .is_err());
        assert!(deadline.is_pending());
        deadline.elapsed().await;
        assert!(!deadline.is_pending());
        // Inert afterwards.
        assert!(timeout(Duration::from_secs(60), deadline.elapsed())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let mut deadline = Deadline::start(Duration::from_millis(100));
        assert!(deadline.cancel());
        assert!(!deadline.cancel());
        advance(Duration::from_millis(200)).await;
        assert!(timeout(Duration::from_millis(10), deadline.elapsed())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_noop() {
        let mut deadline = Deadline::start(Duration::from_millis(100));
        deadline.elapsed().await;
        assert!(!deadline.cancel());
        assert_eq!(deadline.expires_at(), None);
    }
}
