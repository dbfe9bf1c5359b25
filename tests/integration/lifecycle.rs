use crate::*;

use vmlink_registry::testing::{ChannelCall, MockChannel};
use vmlink_registry::{freeze, sweep_once, EntryStatus, SweepReport};

/// Timeout asks a live channel to suspend once; the reap then destroys it.
#[test]
fn test_stale_listener_is_suspended_then_destroyed() {
    let (t, clock) = registry();
    let e = t.insert(mac(1), 1).unwrap();
    let ch = MockChannel::new(11);
    e.attach_channel(ch.clone(), true);

    clock.advance(STALENESS * 2);
    assert_eq!(t.check_timeout(), 1);
    assert_eq!(t.check_timeout(), 0);
    assert_eq!(ch.calls(), vec![ChannelCall::BeginSuspend]);

    assert_eq!(t.reap_suspended(), 1);
    assert_eq!(ch.calls(), vec![ChannelCall::BeginSuspend, ChannelCall::Destroy]);
    assert!(e.is_torn_down());
    assert_eq!(e.status(), EntryStatus::Init);
}

#[test]
fn test_connector_side_disconnects_on_remove() {
    let (t, _) = registry();
    let e = t.insert(mac(1), 1).unwrap();
    let ch = MockChannel::new(12);
    e.attach_channel(ch.clone(), false);

    assert_eq!(t.lookup_by_channel(12).unwrap().mac(), mac(1));
    assert!(t.remove(&mac(1)));
    assert_eq!(ch.calls(), vec![ChannelCall::Disconnect]);
    assert!(t.lookup_by_channel(12).is_none());
}

#[test]
fn test_suspend_all_notifies_live_peers() {
    let (t, _) = registry();
    let live = MockChannel::new(1);
    let dead = MockChannel::new(2);
    dead.set_live(false);
    t.insert(mac(1), 1).unwrap().attach_channel(live.clone(), true);
    t.insert(mac(2), 2).unwrap().attach_channel(dead.clone(), true);
    t.insert(mac(3), 3).unwrap();

    assert_eq!(t.mark_suspend_all(), 3);
    assert_eq!(live.calls(), vec![ChannelCall::BeginSuspend, ChannelCall::NotifyPeer]);
    assert!(dead.calls().is_empty());
}

#[test]
fn test_sweep_reports_each_phase() {
    let (t, clock) = registry();
    t.insert(mac(1), 1).unwrap();
    clock.advance(STALENESS + Duration::from_millis(1));
    let fresh = t.insert(mac(2), 2).unwrap();
    let ch = MockChannel::new(2);
    ch.set_pending(512);
    fresh.attach_channel(ch.clone(), true);

    let report = sweep_once(&t);

    assert_eq!(report, SweepReport { stale: 1, reaped: 1, nudged: 1 });
    assert_eq!(ch.calls(), vec![ChannelCall::NotifyPeer]);
    assert_consistent(&t);
}

#[tokio::test]
async fn test_freeze_wakes_on_reap() {
    let (t, _) = registry();
    for i in 0..3 {
        t.insert(mac(i), i as u16).unwrap();
    }

    let sweeper = {
        let t = t.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sweep_once(&t)
        })
    };

    assert!(freeze(&t, Duration::from_secs(2)).await);
    assert_eq!(sweeper.await.unwrap().reaped, 3);
    assert!(t.is_empty());
}

#[tokio::test]
async fn test_retry_timer_cancelled_by_teardown() {
    let (t, _) = registry();
    let e = t.insert(mac(1), 1).unwrap();
    let timer = tokio::spawn(async {
        tokio::time::sleep(Duration::from_secs(60)).await;
    });
    e.set_retry_timer(timer.abort_handle());
    assert!(e.has_retry_timer());

    t.remove(&mac(1));

    let joined = tokio::time::timeout(Duration::from_secs(1), timer)
        .await
        .expect("timer still running");
    assert!(joined.unwrap_err().is_cancelled());
}
