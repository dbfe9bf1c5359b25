//! Lifecycle passes over the whole table.
//!
//! Timeout detection, discovery refresh, migration freeze, reaping of
//! suspended entries and full teardown. Every pass walks a snapshot of the
//! MAC index, so entries unlinked mid-pass are simply skipped.
//!
//! Field updates (`status`, `last_seen`) race with lookups; the
//! next pass reconciles whatever a concurrent reader or writer changed.

use std::collections::HashSet;

use vmlink_core::MacAddr;

use crate::channel;
use crate::registry::Registry;

/// Result of one discovery refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub refreshed: usize,
    pub suspended: usize,
}

impl Registry {
    /// Mark every entry not refreshed within the staleness threshold as
    /// suspended. Entries stay linked until [`reap_suspended`](Self::reap_suspended).
    ///
    /// Returns the number of entries this pass moved to `Suspend`; entries
    /// already suspended are not counted again. Signals once if any moved.
    pub fn check_timeout(&self) -> usize {
        let now = self.clock.now_ms();
        let threshold = self.staleness.as_millis() as u64;

        let mut stale = 0;
        for entry in self.macs.entries() {
            if entry.age_ms(now) <= threshold || !entry.suspend() {
                continue;
            }
            channel::begin_suspend(&entry);
            stale += 1;
            tracing::debug!(
                mac = %entry.mac(),
                age_ms = entry.age_ms(now),
                "entry timed out, suspended"
            );
        }

        if stale > 0 {
            tracing::info!(stale, "timeout sweep marked entries suspended");
            self.signal.signal();
        }
        stale
    }

    /// Apply one discovery round.
    ///
    /// Entries named in `seen` get a fresh timestamp; every other entry is
    /// suspended at once. A single missed round is treated as departure.
    pub fn update(&self, seen: &[MacAddr]) -> UpdateOutcome {
        let now = self.clock.now_ms();
        let seen: HashSet<MacAddr> = seen.iter().copied().collect();

        let mut outcome = UpdateOutcome::default();
        for entry in self.macs.entries() {
            if seen.contains(&entry.mac()) {
                entry.touch(now);
                outcome.refreshed += 1;
                continue;
            }
            if entry.suspend() {
                channel::begin_suspend(&entry);
                outcome.suspended += 1;
            }
        }

        if outcome.suspended > 0 {
            tracing::info!(
                refreshed = outcome.refreshed,
                suspended = outcome.suspended,
                "discovery round suspended unreported peers"
            );
            self.signal.signal();
        }
        outcome
    }

    /// Freeze the table: every entry goes to `Suspend` and every live
    /// channel is asked to suspend and its peer woken.
    pub fn mark_suspend_all(&self) -> usize {
        let mut marked = 0;
        for entry in self.macs.entries() {
            if let Some(ch) = entry.channel().filter(|c| c.is_live()) {
                ch.begin_suspend();
                ch.notify_peer();
            }
            entry.suspend();
            marked += 1;
        }
        tracing::info!(marked, "all entries marked suspended");
        marked
    }

    pub fn has_suspended_entry(&self) -> bool {
        self.macs.entries().iter().any(|e| e.is_suspended())
    }

    /// Remove every suspended entry from both indices and tear it down.
    ///
    /// The IP reference is unlinked before the owning slot is freed.
    pub fn reap_suspended(&self) -> usize {
        let mut reaped = Vec::new();
        for entry in self.macs.entries() {
            if !entry.is_suspended() {
                continue;
            }
            let guard = self.lock.lock();
            // Re-check under the lock: the entry may have been removed (or
            // replaced under the same address) since the snapshot.
            if let Some(e) = self.detach_locked(&guard, &entry.mac(), entry.handle()) {
                reaped.push(e);
            }
        }

        for entry in &reaped {
            channel::teardown(entry);
        }

        if !reaped.is_empty() {
            tracing::info!(reaped = reaped.len(), "reaped suspended entries");
            self.signal.signal();
        }
        reaped.len()
    }

    /// Tear down every entry and release the backing storage.
    ///
    /// The registry accepts no inserts afterwards.
    pub fn drain_all(&self) -> usize {
        let drained = {
            let guard = self.lock.lock();
            self.ips.clear(&guard);
            self.macs.release(&guard)
        };

        for entry in &drained {
            entry.set_ip(None);
            channel::teardown(entry);
        }

        tracing::info!(drained = drained.len(), "registry drained");
        self.signal.signal();
        drained.len()
    }

    /// Wake the peer of every live channel that has outbound data queued.
    pub fn notify_all_channels(&self) -> usize {
        let nudged = self
            .macs
            .entries()
            .iter()
            .filter(|e| channel::nudge_if_pending(e))
            .count();
        if nudged > 0 {
            tracing::trace!(nudged, "nudged peers with pending data");
        }
        nudged
    }
}
