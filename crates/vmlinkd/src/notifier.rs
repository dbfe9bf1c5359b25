//! Peer notifier used by the daemon.
//!
//! The control-message transport to remote VMs lives outside this process;
//! until it is wired in, explicit removals are only logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use vmlink_core::MacAddr;
use vmlink_registry::PeerNotifier;

#[derive(Default)]
pub struct LogNotifier {
    sent: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl PeerNotifier for LogNotifier {
    fn send_teardown(&self, mac: MacAddr) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(mac = %mac, "teardown notice for remote peer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vmlink_registry::Registry;

    #[test]
    fn counts_notices_from_removal() {
        let registry = Registry::new(13, 4, Duration::from_secs(5));
        let notifier = LogNotifier::new();
        let mac: MacAddr = "00:16:3e:00:00:01".parse().unwrap();
        registry.insert(mac, 1).unwrap();

        assert!(registry.remove_and_notify(&mac, &notifier));
        assert!(!registry.remove_and_notify(&mac, &notifier));
        assert_eq!(notifier.sent(), 1);
    }
}
