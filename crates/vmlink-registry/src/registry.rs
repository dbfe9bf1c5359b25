//! Both indices behind one structural lock.
//!
//! Structural operations (insert, insert_ip, remove, remove_ip) take the
//! shared lock for the link/unlink step only. Teardown side effects run
//! after the lock is dropped so a slow channel destroy never stalls other
//! structural operations.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use vmlink_core::config::VmlinkConfig;
use vmlink_core::MacAddr;

use crate::bucket::StructuralLock;
use crate::channel::{self, ChannelId, PeerNotifier};
use crate::clock::{Clock, MonotonicClock};
use crate::entry::{ConnectionEntry, EntrySnapshot, PeerId};
use crate::error::RegistryError;
use crate::index::{IpIndex, MacIndex};
use crate::signal::SuspendSignal;

pub struct Registry {
    pub(crate) macs: MacIndex,
    pub(crate) ips: IpIndex,
    pub(crate) lock: StructuralLock,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) signal: SuspendSignal,
    pub(crate) staleness: Duration,
}

impl Registry {
    /// Build a registry on the monotonic clock.
    pub fn new(buckets: usize, max_entries: usize, staleness: Duration) -> Self {
        Self::with_clock(buckets, max_entries, staleness, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        buckets: usize,
        max_entries: usize,
        staleness: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lock: StructuralLock = Arc::new(Mutex::new(()));
        Self {
            macs: MacIndex::new(buckets, max_entries, lock.clone()),
            ips: IpIndex::new(buckets, lock.clone()),
            lock,
            clock,
            signal: SuspendSignal::new(),
            staleness,
        }
    }

    pub fn from_config(config: &VmlinkConfig) -> Self {
        Self::new(
            config.registry.buckets,
            config.registry.max_entries,
            config.discovery.staleness_threshold(),
        )
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn mac_count(&self) -> usize {
        self.macs.len()
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macs.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.macs.bucket_count()
    }

    pub fn capacity(&self) -> usize {
        self.macs.capacity()
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn signal(&self) -> &SuspendSignal {
        &self.signal
    }

    /// Subscribe to suspend/reap notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.signal.subscribe()
    }

    // ── Structural operations ─────────────────────────────────────────────────

    /// Register a newly discovered peer in `Init` state.
    ///
    /// Rejects an address that is already present.
    pub fn insert(&self, mac: MacAddr, peer_id: PeerId) -> Result<Arc<ConnectionEntry>, RegistryError> {
        let now = self.clock.now_ms();
        let guard = self.lock.lock();
        if self.macs.lookup_handle(&mac).is_some() {
            return Err(RegistryError::DuplicateMac(mac));
        }
        let entry = self.macs.link(&guard, mac, peer_id, now)?;
        drop(guard);

        tracing::debug!(mac = %mac, peer_id, "entry inserted");
        Ok(entry)
    }

    /// Remove any existing entry for `mac`, then insert a fresh one.
    ///
    /// This is how a resumed or migrated peer comes back: suspended entries
    /// are never revived in place.
    pub fn reinsert(&self, mac: MacAddr, peer_id: PeerId) -> Result<Arc<ConnectionEntry>, RegistryError> {
        self.remove(&mac);
        self.insert(mac, peer_id)
    }

    /// Index `entry` under `ip` and record the ip on the entry.
    pub fn insert_ip(&self, ip: Ipv4Addr, entry: &ConnectionEntry) -> Result<(), RegistryError> {
        if ip.is_unspecified() {
            return Err(RegistryError::UnspecifiedIp);
        }

        let guard = self.lock.lock();
        let live = self
            .macs
            .resolve(entry.handle())
            .is_some_and(|e| std::ptr::eq(Arc::as_ptr(&e), entry));
        if !live {
            return Err(RegistryError::StaleHandle);
        }
        if let Some(existing) = entry.ip() {
            return Err(RegistryError::IpAlreadyAssigned {
                mac: entry.mac(),
                ip: existing,
            });
        }
        if self.ips.lookup_handle(&ip).is_some() {
            return Err(RegistryError::DuplicateIp(ip));
        }

        entry.set_ip(Some(ip));
        self.ips.link(&guard, ip, entry.handle());
        drop(guard);

        tracing::debug!(mac = %entry.mac(), ip = %ip, "ip indexed");
        Ok(())
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<Arc<ConnectionEntry>> {
        self.macs.lookup(mac)
    }

    pub fn lookup_ip(&self, ip: &Ipv4Addr) -> Option<Arc<ConnectionEntry>> {
        let handle = self.ips.lookup_handle(ip)?;
        // The slot may have been reaped between the two reads; a mismatch
        // here is a race, not an inconsistency.
        self.macs
            .resolve(handle)
            .filter(|e| e.ip() == Some(*ip))
    }

    /// Full scan for the entry owning channel `id`.
    pub fn lookup_by_channel(&self, id: ChannelId) -> Option<Arc<ConnectionEntry>> {
        self.macs
            .entries()
            .into_iter()
            .find(|e| e.channel_id() == Some(id))
    }

    /// Unlink, tear down and release the entry for `mac`.
    ///
    /// Returns `false` (and does nothing) if the address is absent.
    pub fn remove(&self, mac: &MacAddr) -> bool {
        match self.detach(mac) {
            Some(entry) => {
                channel::teardown(&entry);
                tracing::debug!(mac = %mac, peer_id = entry.peer_id(), "entry removed");
                true
            }
            None => false,
        }
    }

    /// [`remove`](Self::remove), then tell the remote VM to tear down its side.
    pub fn remove_and_notify(&self, mac: &MacAddr, notifier: &dyn PeerNotifier) -> bool {
        let removed = self.remove(mac);
        if removed {
            notifier.send_teardown(*mac);
        }
        removed
    }

    /// Drop the IP reference at `ip`. The entry itself stays.
    pub fn remove_ip(&self, ip: &Ipv4Addr) -> bool {
        let guard = self.lock.lock();
        let Some(handle) = self.ips.unlink(&guard, ip, None) else {
            return false;
        };
        if let Some(entry) = self.macs.resolve(handle) {
            entry.set_ip(None);
        }
        true
    }

    /// Unlink `mac` from both indices, secondary first, and free its slot.
    pub(crate) fn detach(&self, mac: &MacAddr) -> Option<Arc<ConnectionEntry>> {
        let guard = self.lock.lock();
        let handle = self.macs.lookup_handle(mac)?;
        self.detach_locked(&guard, mac, handle)
    }

    pub(crate) fn detach_locked(
        &self,
        guard: &crate::bucket::StructuralGuard<'_>,
        mac: &MacAddr,
        handle: crate::arena::EntryHandle,
    ) -> Option<Arc<ConnectionEntry>> {
        let entry = self.macs.resolve(handle)?;
        if let Some(ip) = entry.ip() {
            if self.ips.unlink(guard, &ip, Some(handle)).is_none() {
                debug_assert!(false, "entry {mac} carries ip {ip} but is not in the ip index");
                tracing::warn!(mac = %mac, ip = %ip, "ip reference missing during unlink");
            }
            entry.set_ip(None);
        }
        self.macs.unlink(guard, mac, handle)
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let now = self.clock.now_ms();
        let mut out: Vec<EntrySnapshot> = self
            .macs
            .entries()
            .iter()
            .map(|e| e.snapshot(now))
            .collect();
        out.sort_by_key(|s| s.mac);
        out
    }

    /// Audit both indices against each other.
    ///
    /// Holds the structural lock for the whole walk, so the result reflects
    /// one consistent state.
    pub fn verify(&self) -> Result<(), RegistryError> {
        let _guard = self.lock.lock();
        let violation = |msg: String| Err(RegistryError::ConsistencyViolation(msg));

        let mac_chains = self.macs.store().chain_len();
        if mac_chains != self.macs.len() {
            return violation(format!(
                "mac count {} but {} linked",
                self.macs.len(),
                mac_chains
            ));
        }
        if self.macs.arena_len() != mac_chains {
            return violation(format!(
                "{} live slots but {} linked",
                self.macs.arena_len(),
                mac_chains
            ));
        }
        let ip_chains = self.ips.store().chain_len();
        if ip_chains != self.ips.len() {
            return violation(format!(
                "ip count {} but {} linked",
                self.ips.len(),
                ip_chains
            ));
        }
        if let Some(mac) = self.macs.store().misplaced_key() {
            return violation(format!("{mac} linked in the wrong bucket"));
        }
        if let Some(ip) = self.ips.store().misplaced_key() {
            return violation(format!("{ip} linked in the wrong bucket"));
        }

        // Every ip reference points at a live entry that agrees with it.
        let mut first_error = None;
        self.ips.store().for_each_bucket(|_, chain| {
            for (ip, handle) in chain {
                if first_error.is_some() {
                    return;
                }
                match self.macs.resolve(*handle) {
                    None => first_error = Some(format!("ip {ip} references a freed entry")),
                    Some(e) if e.ip() != Some(*ip) => {
                        first_error = Some(format!("ip {ip} references {} with ip {:?}", e.mac(), e.ip()))
                    }
                    Some(e) if self.macs.lookup_handle(&e.mac()) != Some(*handle) => {
                        first_error = Some(format!("ip {ip} references unlinked {}", e.mac()))
                    }
                    Some(_) => {}
                }
            }
        });
        if let Some(msg) = first_error {
            return violation(msg);
        }

        // Every entry with an ip is reachable through the ip index.
        for entry in self.macs.entries() {
            if let Some(ip) = entry.ip() {
                if self.ips.store().lookup_where(&ip, |h| h == entry.handle()).is_none() {
                    return violation(format!("{} has ip {ip} but no ip reference", entry.mac()));
                }
            }
        }
        Ok(())
    }
}
