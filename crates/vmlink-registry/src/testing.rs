//! Test doubles: a hand-driven clock, a recording channel and a recording
//! peer notifier.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use vmlink_core::MacAddr;

use crate::channel::{Channel, ChannelId, PeerNotifier};
use crate::clock::Clock;

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCall {
    BeginSuspend,
    NotifyPeer,
    Destroy,
    Disconnect,
}

/// Channel that records every call made on it.
#[derive(Debug)]
pub struct MockChannel {
    id: ChannelId,
    live: AtomicBool,
    pending: AtomicUsize,
    calls: Mutex<Vec<ChannelCall>>,
}

impl MockChannel {
    pub fn new(id: ChannelId) -> Arc<Self> {
        Arc::new(Self {
            id,
            live: AtomicBool::new(true),
            pending: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }

    pub fn set_pending(&self, bytes: usize) {
        self.pending.store(bytes, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ChannelCall) {
        self.calls.lock().push(call);
    }
}

impl Channel for MockChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    fn begin_suspend(&self) {
        self.record(ChannelCall::BeginSuspend);
    }

    fn notify_peer(&self) {
        self.record(ChannelCall::NotifyPeer);
    }

    fn destroy(&self) {
        self.set_live(false);
        self.record(ChannelCall::Destroy);
    }

    fn disconnect(&self) {
        self.set_live(false);
        self.record(ChannelCall::Disconnect);
    }

    fn pending_outbound(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

/// Notifier that remembers which peers were told to tear down.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<MacAddr>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<MacAddr> {
        self.sent.lock().clone()
    }
}

impl PeerNotifier for RecordingNotifier {
    fn send_teardown(&self, mac: MacAddr) {
        self.sent.lock().push(mac);
    }
}
