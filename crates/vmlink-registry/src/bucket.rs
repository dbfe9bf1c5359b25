//! Fixed-size bucketed store of `(key, handle)` links.
//!
//! Every structural change (link, unlink, count update) happens under one
//! [`StructuralLock`] that may be shared by several stores. Reads take only
//! the target bucket's read lock, so a lookup never waits on the structural
//! lock and never waits on more than one in-flight bucket edit.
//!
//! The store performs no uniqueness check. Callers that need unique keys
//! check and link under the same structural guard.

use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use vmlink_core::MacAddr;

use crate::arena::EntryHandle;

/// The single mutation lock shared across indices.
pub type StructuralLock = Arc<Mutex<()>>;

/// Proof that the structural lock is held.
pub type StructuralGuard<'a> = MutexGuard<'a, ()>;

/// Key types that can select a bucket.
///
/// The mapping must be stable for the lifetime of the store.
pub trait BucketKey: Copy + Eq + fmt::Display {
    fn bucket(&self, buckets: usize) -> usize;
}

impl BucketKey for MacAddr {
    fn bucket(&self, buckets: usize) -> usize {
        MacAddr::bucket(self, buckets)
    }
}

impl BucketKey for Ipv4Addr {
    fn bucket(&self, buckets: usize) -> usize {
        u32::from(*self) as usize % buckets.max(1)
    }
}

type Chain<K> = VecDeque<(K, EntryHandle)>;

pub struct BucketStore<K> {
    buckets: Box<[RwLock<Chain<K>>]>,
    count: AtomicUsize,
    lock: StructuralLock,
}

impl<K: BucketKey> BucketStore<K> {
    /// Create a store with `buckets` chains (at least one).
    pub fn new(buckets: usize, lock: StructuralLock) -> Self {
        let buckets = (0..buckets.max(1))
            .map(|_| RwLock::new(VecDeque::new()))
            .collect();
        Self {
            buckets,
            count: AtomicUsize::new(0),
            lock,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Live link count. Exact whenever no structural edit is in flight.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn structural_lock(&self) -> &StructuralLock {
        &self.lock
    }

    fn chain(&self, key: &K) -> &RwLock<Chain<K>> {
        &self.buckets[key.bucket(self.buckets.len())]
    }

    fn assert_guard(&self, guard: &StructuralGuard<'_>) {
        debug_assert!(
            std::ptr::eq(MutexGuard::mutex(guard), &*self.lock),
            "structural guard belongs to a different lock"
        );
    }

    /// Link `(key, handle)` at the head of its bucket.
    #[cfg(test)]
    fn insert(&self, key: K, handle: EntryHandle) {
        let guard = self.lock.lock();
        self.insert_locked(&guard, key, handle);
    }

    pub(crate) fn insert_locked(&self, guard: &StructuralGuard<'_>, key: K, handle: EntryHandle) {
        self.assert_guard(guard);
        self.chain(&key).write().push_front((key, handle));
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// First handle linked under `key`.
    pub fn lookup(&self, key: &K) -> Option<EntryHandle> {
        self.lookup_where(key, |_| true)
    }

    /// First handle linked under `key` that satisfies `pred`.
    pub fn lookup_where<P>(&self, key: &K, pred: P) -> Option<EntryHandle>
    where
        P: Fn(EntryHandle) -> bool,
    {
        self.chain(key)
            .read()
            .iter()
            .find(|(k, h)| k == key && pred(*h))
            .map(|(_, h)| *h)
    }

    /// Unlink the first link under `key`.
    #[cfg(test)]
    fn remove(&self, key: &K) -> Option<EntryHandle> {
        let guard = self.lock.lock();
        self.remove_locked(&guard, key, |_| true)
    }

    pub(crate) fn remove_locked<P>(
        &self,
        guard: &StructuralGuard<'_>,
        key: &K,
        pred: P,
    ) -> Option<EntryHandle>
    where
        P: Fn(EntryHandle) -> bool,
    {
        self.assert_guard(guard);
        let mut chain = self.chain(key).write();
        let pos = chain.iter().position(|(k, h)| k == key && pred(*h))?;
        let (_, handle) = chain.remove(pos)?;
        self.count.fetch_sub(1, Ordering::Relaxed);
        Some(handle)
    }

    /// Unlink everything, returning the removed links.
    pub(crate) fn clear_locked(&self, guard: &StructuralGuard<'_>) -> Vec<(K, EntryHandle)> {
        self.assert_guard(guard);
        let mut out = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter() {
            out.extend(bucket.write().drain(..));
        }
        self.count.store(0, Ordering::Relaxed);
        out
    }

    /// Visit every bucket with a snapshot of its chain.
    ///
    /// The bucket lock is released before the visitor runs, so the visitor
    /// may unlink the element it is looking at (or any other).
    pub fn for_each_bucket<F>(&self, mut visitor: F)
    where
        F: FnMut(usize, &[(K, EntryHandle)]),
    {
        for (i, bucket) in self.buckets.iter().enumerate() {
            let snapshot: Vec<(K, EntryHandle)> = bucket.read().iter().copied().collect();
            if !snapshot.is_empty() {
                visitor(i, &snapshot);
            }
        }
    }

    /// Number of links reachable by walking every chain.
    pub fn chain_len(&self) -> usize {
        self.buckets.iter().map(|b| b.read().len()).sum()
    }

    /// Whether each link sits in the bucket its key hashes to.
    pub(crate) fn misplaced_key(&self) -> Option<K> {
        let n = self.buckets.len();
        self.buckets.iter().enumerate().find_map(|(i, bucket)| {
            bucket
                .read()
                .iter()
                .find(|(k, _)| k.bucket(n) != i)
                .map(|(k, _)| *k)
        })
    }
}
