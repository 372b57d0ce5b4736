//! Page-wide message channel: stateless fan-out of raw text payloads.
//! Every session subscribes on its own and filters by nonce.
//! Each listener gets its own unbounded queue, so a slow listener never loses
//! payloads to a busy page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One payload as delivered to a listener, stamped with when it was posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub at: Instant,
    pub payload: Arc<str>,
}

/// Shared transport. Cloning hands out another handle to the same channel.
#[derive(Debug, Clone, Default)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

#[derive(Debug, Default)]
struct BusInner {
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<Posted>>>,
    next_id: AtomicU64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a raw payload to every current subscriber (peer side).
    /// Returns how many subscribers it reached; nobody listening is not an error.
    pub fn post(&self, payload: impl Into<Arc<str>>) -> usize {
        let posted = Posted {
            at: Instant::now(),
            payload: payload.into(),
        };
        let listeners = self.inner.listeners.lock();
        listeners
            .values()
            .filter(|tx| tx.send(posted.clone()).is_ok())
            .count()
    }

    /// Attach a new listener. It sees only payloads posted after this call.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners.lock().insert(id, tx);
        Subscription {
            id,
            receiver: Some(rx),
            bus: self.inner.clone(),
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Scoped listener. Detaches exactly once: on [`Subscription::unsubscribe`] or drop,
/// whichever comes first.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Option<mpsc::UnboundedReceiver<Posted>>,
    bus: Arc<BusInner>,
}

impl Subscription {
    /// Next payload, in posting order. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Posted> {
        self.receiver.as_mut()?.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Detach from the bus. Returns false if already detached.
    pub fn unsubscribe(&mut self) -> bool {
        match self.receiver.take() {
            Some(receiver) => {
                self.bus.listeners.lock().remove(&self.id);
                drop(receiver);
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_out_reaches_every_listener() {
        let bus = MessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.post("ping"), 2);
        assert_eq!(a.recv().await.map(|p| p.payload).as_deref(), Some("ping"));
        assert_eq!(b.recv().await.map(|p| p.payload).as_deref(), Some("ping"));
    }

    #[test]
    fn post_without_listeners_is_harmless() {
        let bus = MessageBus::new();
        assert_eq!(bus.post("lost"), 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_exactly_once() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(bus.listener_count(), 0);
        assert!(!sub.is_active());
        assert!(sub.recv().await.is_none());
        drop(sub);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn drop_detaches() {
        let bus = MessageBus::new();
        {
            let _sub = bus.subscribe();
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.post("nobody"), 0);
    }

    #[tokio::test]
    async fn slow_listener_keeps_every_payload() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        for i in 0..500 {
            bus.post(format!("m{i}"));
        }
        for i in 0..500 {
            assert_eq!(sub.recv().await.map(|p| p.payload).as_deref(), Some(format!("m{i}").as_str()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn payloads_carry_post_time() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        let t0 = Instant::now();
        tokio::time::advance(std::time::Duration::from_millis(30)).await;
        bus.post("late");
        tokio::time::advance(std::time::Duration::from_millis(30)).await;
        let posted = sub.recv().await.unwrap();
        assert_eq!(posted.at - t0, std::time::Duration::from_millis(30));
    }

    #[tokio::test]
    async fn detaching_one_listener_leaves_others() {
        let bus = MessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert!(a.unsubscribe());
        assert_eq!(bus.post("still here"), 1);
        assert_eq!(b.recv().await.map(|p| p.payload).as_deref(), Some("still here"));
        assert!(a.recv().await.is_none());
    }
}
