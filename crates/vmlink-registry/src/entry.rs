//! One connection entry per neighbouring VM.
//!
//! Identity (`mac`, `peer_id`, `handle`) is immutable. The mutable fields are
//! atomics written with relaxed ordering and no structural lock: a reader may
//! see a value one sweep pass stale, and the next pass reconciles it.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use vmlink_core::MacAddr;

use crate::arena::EntryHandle;
use crate::channel::{Channel, ChannelId};

/// Identifier of the remote virtual machine (its domain id).
pub type PeerId = u16;

/// Entry status.
///
/// The registry itself only moves entries between `Init` and `Suspend`.
/// `Listen` and `Connected` are written by channel-establishment code and are
/// treated like `Init` by every lifecycle pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EntryStatus {
    Init = 0,
    Listen = 1,
    Connected = 2,
    Suspend = 3,
}

impl EntryStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EntryStatus::Listen,
            2 => EntryStatus::Connected,
            3 => EntryStatus::Suspend,
            _ => EntryStatus::Init,
        }
    }
}

pub struct ConnectionEntry {
    handle: EntryHandle,
    mac: MacAddr,
    peer_id: PeerId,
    /// 0 = not yet IP-indexed.
    ip: AtomicU32,
    status: AtomicU8,
    last_seen_ms: AtomicU64,
    listen_role: AtomicBool,
    retry_count: AtomicU32,
    torn_down: AtomicBool,
    channel: Mutex<Option<Arc<dyn Channel>>>,
    retry_timer: Mutex<Option<AbortHandle>>,
}

impl ConnectionEntry {
    pub(crate) fn new(handle: EntryHandle, mac: MacAddr, peer_id: PeerId, now_ms: u64) -> Self {
        Self {
            handle,
            mac,
            peer_id,
            ip: AtomicU32::new(0),
            status: AtomicU8::new(EntryStatus::Init as u8),
            last_seen_ms: AtomicU64::new(now_ms),
            listen_role: AtomicBool::new(false),
            retry_count: AtomicU32::new(0),
            torn_down: AtomicBool::new(false),
            channel: Mutex::new(None),
            retry_timer: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> EntryHandle {
        self.handle
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    // ── IP ────────────────────────────────────────────────────────────────────

    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self.ip.load(Ordering::Relaxed) {
            0 => None,
            raw => Some(Ipv4Addr::from(raw)),
        }
    }

    /// Only the registry writes this, under the structural lock, so the
    /// field always agrees with the IP index.
    pub(crate) fn set_ip(&self, ip: Option<Ipv4Addr>) {
        self.ip
            .store(ip.map(u32::from).unwrap_or(0), Ordering::Relaxed);
    }

    // ── Status ────────────────────────────────────────────────────────────────

    pub fn status(&self) -> EntryStatus {
        EntryStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn set_status(&self, status: EntryStatus) {
        self.status.store(status as u8, Ordering::Relaxed);
    }

    pub fn is_suspended(&self) -> bool {
        self.status() == EntryStatus::Suspend
    }

    /// Flip to `Suspend`. Returns whether the entry was not already suspended.
    pub(crate) fn suspend(&self) -> bool {
        self.status.swap(EntryStatus::Suspend as u8, Ordering::Relaxed) != EntryStatus::Suspend as u8
    }

    // ── Timestamps ────────────────────────────────────────────────────────────

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self, now_ms: u64) {
        self.last_seen_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_seen_ms())
    }

    // ── Channel ───────────────────────────────────────────────────────────────

    /// Record an established channel and which side of it we are.
    ///
    /// Returns the channel previously attached, if any. An entry that has
    /// already been torn down keeps nothing: the channel is released on the
    /// spot (destroyed if listening, disconnected otherwise).
    pub fn attach_channel(
        &self,
        channel: Arc<dyn Channel>,
        listen_role: bool,
    ) -> Option<Arc<dyn Channel>> {
        {
            let mut slot = self.channel.lock();
            if !self.is_torn_down() {
                self.listen_role.store(listen_role, Ordering::Relaxed);
                return slot.replace(channel);
            }
        }

        tracing::debug!(
            mac = %self.mac,
            channel = channel.id(),
            "channel offered to torn-down entry, releasing"
        );
        if listen_role {
            channel.destroy();
        } else {
            channel.disconnect();
        }
        None
    }

    pub fn detach_channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.lock().take()
    }

    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.lock().clone()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel.lock().as_ref().map(|c| c.id())
    }

    pub fn has_channel(&self) -> bool {
        self.channel.lock().is_some()
    }

    /// Whether this side is the listening (resource-owning) party.
    pub fn listen_role(&self) -> bool {
        self.listen_role.load(Ordering::Relaxed)
    }

    // ── Retry bookkeeping ─────────────────────────────────────────────────────

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Increment the ack-retry counter and return the new value.
    pub fn bump_retry(&self) -> u32 {
        self.retry_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset_retry(&self) {
        self.retry_count.store(0, Ordering::Relaxed);
    }

    /// Arm the ack-retry timer, aborting any previous one.
    pub fn set_retry_timer(&self, timer: AbortHandle) {
        let mut slot = self.retry_timer.lock();
        if self.is_torn_down() {
            timer.abort();
            return;
        }
        if let Some(old) = slot.replace(timer) {
            old.abort();
        }
    }

    pub fn has_retry_timer(&self) -> bool {
        self.retry_timer.lock().is_some()
    }

    pub(crate) fn cancel_retry_timer(&self) {
        if let Some(timer) = self.retry_timer.lock().take() {
            timer.abort();
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Set once the entry has been unlinked and torn down. Timer callbacks
    /// check this before touching the entry.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Set the torn-down flag. Returns whether this call set it.
    ///
    /// Flipped with both resource slots locked, so `attach_channel` and
    /// `set_retry_timer` either land before (and teardown collects them) or
    /// see the flag.
    pub(crate) fn mark_torn_down(&self) -> bool {
        let _channel = self.channel.lock();
        let _timer = self.retry_timer.lock();
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    pub fn snapshot(&self, now_ms: u64) -> EntrySnapshot {
        EntrySnapshot {
            mac: self.mac,
            ip: self.ip(),
            peer_id: self.peer_id,
            status: self.status(),
            age_ms: self.age_ms(now_ms),
            listen_role: self.listen_role(),
            has_channel: self.has_channel(),
            retry_count: self.retry_count(),
        }
    }
}

impl std::fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("mac", &self.mac)
            .field("peer_id", &self.peer_id)
            .field("ip", &self.ip())
            .field("status", &self.status())
            .field("last_seen_ms", &self.last_seen_ms())
            .field("has_channel", &self.has_channel())
            .finish()
    }
}

/// Point-in-time view of an entry, for the API and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub mac: MacAddr,
    pub ip: Option<Ipv4Addr>,
    pub peer_id: PeerId,
    pub status: EntryStatus,
    pub age_ms: u64,
    pub listen_role: bool,
    pub has_channel: bool,
    pub retry_count: u32,
}
