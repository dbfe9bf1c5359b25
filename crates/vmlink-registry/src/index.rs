//! The two indices over connection entries.
//!
//! `MacIndex` owns entries: they are allocated in and freed from its arena.
//! `IpIndex` only links handles to entries owned by `MacIndex` and resolves
//! them through it; a handle whose slot has moved on resolves to `None`.

use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;
use vmlink_core::MacAddr;

use crate::arena::{Arena, EntryHandle};
use crate::bucket::{BucketStore, StructuralGuard, StructuralLock};
use crate::entry::{ConnectionEntry, PeerId};
use crate::error::RegistryError;

// ── MacIndex ──────────────────────────────────────────────────────────────────

pub struct MacIndex {
    store: BucketStore<MacAddr>,
    arena: RwLock<Arena<Arc<ConnectionEntry>>>,
}

impl MacIndex {
    pub fn new(buckets: usize, max_entries: usize, lock: StructuralLock) -> Self {
        Self {
            store: BucketStore::new(buckets, lock),
            arena: RwLock::new(Arena::with_capacity(max_entries)),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.store.bucket_count()
    }

    pub fn capacity(&self) -> usize {
        self.arena.read().capacity()
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<Arc<ConnectionEntry>> {
        self.store.lookup(mac).and_then(|h| self.resolve(h))
    }

    pub fn resolve(&self, handle: EntryHandle) -> Option<Arc<ConnectionEntry>> {
        self.arena.read().get(handle).cloned()
    }

    /// Snapshot of every linked entry, for sweep passes.
    pub fn entries(&self) -> Vec<Arc<ConnectionEntry>> {
        let mut out = Vec::with_capacity(self.len());
        self.store.for_each_bucket(|_, chain| {
            out.extend(chain.iter().filter_map(|(_, h)| self.resolve(*h)));
        });
        out
    }

    /// Allocate an entry and link it. No duplicate check.
    pub(crate) fn link(
        &self,
        guard: &StructuralGuard<'_>,
        mac: MacAddr,
        peer_id: PeerId,
        now_ms: u64,
    ) -> Result<Arc<ConnectionEntry>, RegistryError> {
        let entry = {
            let mut arena = self.arena.write();
            let handle = arena.alloc_with(|h| Arc::new(ConnectionEntry::new(h, mac, peer_id, now_ms)))?;
            arena
                .get(handle)
                .cloned()
                .ok_or(RegistryError::StaleHandle)?
        };
        self.store.insert_locked(guard, mac, entry.handle());
        Ok(entry)
    }

    /// Unlink the entry with this handle and free its slot.
    ///
    /// The entry is returned for teardown; it stays allocated until the
    /// last `Arc` (the caller's, or a reader's) is dropped.
    pub(crate) fn unlink(
        &self,
        guard: &StructuralGuard<'_>,
        mac: &MacAddr,
        handle: EntryHandle,
    ) -> Option<Arc<ConnectionEntry>> {
        self.store.remove_locked(guard, mac, |h| h == handle)?;
        self.arena.write().free(handle)
    }

    pub(crate) fn lookup_handle(&self, mac: &MacAddr) -> Option<EntryHandle> {
        self.store.lookup(mac)
    }

    /// Unlink everything and release the arena.
    pub(crate) fn release(&self, guard: &StructuralGuard<'_>) -> Vec<Arc<ConnectionEntry>> {
        self.store.clear_locked(guard);
        self.arena.write().release()
    }

    pub(crate) fn store(&self) -> &BucketStore<MacAddr> {
        &self.store
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.arena.read().len()
    }
}

// ── IpIndex ───────────────────────────────────────────────────────────────────

pub struct IpIndex {
    store: BucketStore<Ipv4Addr>,
}

impl IpIndex {
    pub fn new(buckets: usize, lock: StructuralLock) -> Self {
        Self {
            store: BucketStore::new(buckets, lock),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn lookup_handle(&self, ip: &Ipv4Addr) -> Option<EntryHandle> {
        self.store.lookup(ip)
    }

    pub(crate) fn link(&self, guard: &StructuralGuard<'_>, ip: Ipv4Addr, handle: EntryHandle) {
        self.store.insert_locked(guard, ip, handle);
    }

    /// Unlink the reference at `ip`, restricted to `handle` when given.
    pub(crate) fn unlink(
        &self,
        guard: &StructuralGuard<'_>,
        ip: &Ipv4Addr,
        handle: Option<EntryHandle>,
    ) -> Option<EntryHandle> {
        self.store
            .remove_locked(guard, ip, |h| handle.map_or(true, |want| want == h))
    }

    pub(crate) fn clear(&self, guard: &StructuralGuard<'_>) -> usize {
        self.store.clear_locked(guard).len()
    }

    pub(crate) fn store(&self) -> &BucketStore<Ipv4Addr> {
        &self.store
    }
}
