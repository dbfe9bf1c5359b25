//! Suspend signal. Wakes anyone waiting for the table to change state.
//!
//! Backed by a `watch` channel carrying a generation counter. A receiver
//! that subscribed before a `signal()` always observes it, whether or not it
//! was already awaiting, and every receiver observes it (broadcast).

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct SuspendSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl SuspendSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Wake all current subscribers.
    pub fn signal(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Number of signals sent so far.
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for SuspendSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_before_await_is_not_lost() {
        let signal = SuspendSignal::new();
        let mut rx = signal.subscribe();

        signal.signal();

        tokio::time::timeout(Duration::from_millis(100), rx.changed())
            .await
            .expect("wakeup was lost")
            .unwrap();
        assert_eq!(signal.generation(), 1);
    }

    #[tokio::test]
    async fn every_waiter_wakes() {
        let signal = SuspendSignal::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let mut rx = signal.subscribe();
                tokio::spawn(async move { rx.changed().await.is_ok() })
            })
            .collect();

        tokio::task::yield_now().await;
        signal.signal();

        for w in waiters {
            let woke = tokio::time::timeout(Duration::from_millis(100), w)
                .await
                .expect("waiter never woke")
                .unwrap();
            assert!(woke);
        }
    }

    #[test]
    fn signal_without_subscribers_still_counts() {
        let signal = SuspendSignal::new();
        signal.signal();
        signal.signal();
        assert_eq!(signal.generation(), 2);
    }
}
