//! Channel cooperation: the seam to the external fast-path transport.
//!
//! The registry never looks inside a channel. It only asks it to suspend,
//! nudge its peer, or shut down, and asks whether it is live or has data
//! queued.

use std::fmt;

use vmlink_core::MacAddr;

use crate::entry::ConnectionEntry;

/// Identity of a channel object, used by `lookup_by_channel`.
pub type ChannelId = u64;

/// An established fast-path channel to a peer VM.
///
/// Implementations must be cheap and non-blocking for `is_live`,
/// `begin_suspend`, `notify_peer` and `pending_outbound`; `destroy` and
/// `disconnect` may block and are only called outside the structural lock.
pub trait Channel: Send + Sync {
    fn id(&self) -> ChannelId;

    /// Whether the channel descriptor is still valid.
    fn is_live(&self) -> bool;

    /// Ask both directions to stop accepting new transfers.
    fn begin_suspend(&self);

    /// Send a wake event to the other end.
    fn notify_peer(&self);

    /// Release the shared transport. Called on the listening side only.
    fn destroy(&self);

    /// Drop our view of the transport. Called on the connecting side only.
    fn disconnect(&self);

    /// Bytes queued for the peer.
    fn pending_outbound(&self) -> usize;
}

impl fmt::Debug for dyn Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Fire-and-forget message telling a remote VM to tear down its side.
pub trait PeerNotifier: Send + Sync {
    fn send_teardown(&self, mac: MacAddr);
}

/// Ask the entry's channel, if live, to begin suspending.
///
/// Best effort: the caller marks the entry regardless.
pub(crate) fn begin_suspend(entry: &ConnectionEntry) -> bool {
    match entry.channel() {
        Some(ch) if ch.is_live() => {
            ch.begin_suspend();
            true
        }
        _ => false,
    }
}

/// Nudge the peer if the channel is live and has queued outbound data.
pub(crate) fn nudge_if_pending(entry: &ConnectionEntry) -> bool {
    match entry.channel() {
        Some(ch) if ch.is_live() && ch.pending_outbound() > 0 => {
            ch.notify_peer();
            true
        }
        _ => false,
    }
}

/// Teardown side effects for an entry that has already been unlinked.
///
/// Status goes back to `Init` first so a concurrent suspend pass does not
/// pick the entry up again. Then the retry timer is cancelled and the
/// channel is destroyed (listening side) or disconnected (connecting side).
pub(crate) fn teardown(entry: &ConnectionEntry) {
    entry.set_status(crate::entry::EntryStatus::Init);
    if !entry.mark_torn_down() {
        return;
    }
    entry.cancel_retry_timer();

    if let Some(ch) = entry.detach_channel() {
        if entry.listen_role() {
            ch.destroy();
        } else {
            ch.disconnect();
        }
    }

    tracing::debug!(
        mac = %entry.mac(),
        peer_id = entry.peer_id(),
        "entry torn down"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::entry::EntryStatus;
    use crate::testing::{ChannelCall, MockChannel};

    fn entry() -> ConnectionEntry {
        let mut arena = Arena::with_capacity(1);
        let h = arena.alloc_with(|h| h).unwrap();
        ConnectionEntry::new(h, MacAddr::new([2, 0, 0, 0, 0, 9]), 3, 0)
    }

    #[test]
    fn listening_side_destroys() {
        let e = entry();
        let ch = MockChannel::new(1);
        e.attach_channel(ch.clone(), true);
        e.suspend();

        teardown(&e);

        assert_eq!(ch.calls(), vec![ChannelCall::Destroy]);
        assert_eq!(e.status(), EntryStatus::Init);
        assert!(!e.has_channel());
        assert!(e.is_torn_down());
    }

    #[test]
    fn connecting_side_disconnects() {
        let e = entry();
        let ch = MockChannel::new(1);
        e.attach_channel(ch.clone(), false);

        teardown(&e);

        assert_eq!(ch.calls(), vec![ChannelCall::Disconnect]);
    }

    #[test]
    fn teardown_runs_once() {
        let e = entry();
        let ch = MockChannel::new(1);
        e.attach_channel(ch.clone(), true);
        teardown(&e);
        teardown(&e);
        assert_eq!(ch.calls(), vec![ChannelCall::Destroy]);
    }

    #[test]
    fn suspend_skips_dead_channel() {
        let e = entry();
        assert!(!begin_suspend(&e));

        let ch = MockChannel::new(1);
        ch.set_live(false);
        e.attach_channel(ch.clone(), true);
        assert!(!begin_suspend(&e));
        assert!(ch.calls().is_empty());

        ch.set_live(true);
        assert!(begin_suspend(&e));
        assert_eq!(ch.calls(), vec![ChannelCall::BeginSuspend]);
    }

    #[test]
    fn nudge_requires_pending_data() {
        let e = entry();
        let ch = MockChannel::new(1);
        e.attach_channel(ch.clone(), false);

        assert!(!nudge_if_pending(&e));
        ch.set_pending(128);
        assert!(nudge_if_pending(&e));
        assert_eq!(ch.calls(), vec![ChannelCall::NotifyPeer]);
    }

    #[tokio::test]
    async fn teardown_cancels_retry_timer() {
        let e = entry();
        let timer = tokio::spawn(std::future::pending::<()>());
        e.set_retry_timer(timer.abort_handle());

        teardown(&e);

        assert!(timer.await.unwrap_err().is_cancelled());
        assert!(!e.has_retry_timer());
    }
}
