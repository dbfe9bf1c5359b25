//! vmlink integration test harness.
//!
//! Drives the registry through its public surface only, with a manual
//! clock and mock channels standing in for discovery timing and the
//! shared-memory transport.
//!
//!   cargo test --test integration

use std::sync::Arc;
use std::time::Duration;

use vmlink_core::MacAddr;
use vmlink_registry::testing::ManualClock;
use vmlink_registry::Registry;

mod concurrency;
mod lifecycle;
mod properties;
mod scenario;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const BUCKETS: usize = 13;
pub const CAPACITY: usize = 64;
pub const STALENESS: Duration = Duration::from_secs(5);

/// Registry on a manual clock, with the clock handle for advancing time.
pub fn registry() -> (Arc<Registry>, Arc<ManualClock>) {
    registry_with(BUCKETS, CAPACITY)
}

pub fn registry_with(buckets: usize, capacity: usize) -> (Arc<Registry>, Arc<ManualClock>) {
    let clock = ManualClock::new();
    let registry = Arc::new(Registry::with_clock(
        buckets,
        capacity,
        STALENESS,
        clock.clone(),
    ));
    (registry, clock)
}

/// Xen-style locally administered address ending in `last`.
pub fn mac(last: u8) -> MacAddr {
    MacAddr::new([0x00, 0x16, 0x3e, 0x00, 0x00, last])
}

pub fn mac_n(n: u16) -> MacAddr {
    let [hi, lo] = n.to_be_bytes();
    MacAddr::new([0x00, 0x16, 0x3e, 0x00, hi, lo])
}

/// Every linked entry visible by scanning, checked against both indices.
pub fn assert_consistent(registry: &Registry) {
    if let Err(e) = registry.verify() {
        panic!("registry inconsistent: {e}");
    }
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), registry.mac_count(), "count drifted from scan");
    let with_ip = snapshot.iter().filter(|s| s.ip.is_some()).count();
    assert_eq!(with_ip, registry.ip_count(), "ip count drifted from scan");
}
