use crate::*;
use std::net::Ipv4Addr;

use vmlink_registry::EntryStatus;

#[test]
fn test_ip_index_agrees_with_mac_index() {
    let (t, _) = registry();
    for i in 0..20u8 {
        let e = t.insert(mac(i), i as u16).unwrap();
        if i % 3 != 0 {
            t.insert_ip(Ipv4Addr::new(10, 1, 0, i), &e).unwrap();
        }
    }
    t.remove(&mac(4));
    t.remove_ip(&Ipv4Addr::new(10, 1, 0, 5));

    for snap in t.snapshot() {
        if let Some(ip) = snap.ip {
            let by_ip = t.lookup_ip(&ip).expect("ip index missing entry");
            let by_mac = t.lookup(&snap.mac).expect("mac index missing entry");
            assert!(Arc::ptr_eq(&by_ip, &by_mac));
        }
    }
    assert!(t.lookup_ip(&Ipv4Addr::new(10, 1, 0, 4)).is_none());
    assert_consistent(&t);
}

#[test]
fn test_count_matches_scan_after_churn() {
    let (t, _) = registry_with(3, 256);
    for n in 0..100u16 {
        t.insert(mac_n(n), n).unwrap();
    }
    for n in (0..100u16).step_by(3) {
        assert!(t.remove(&mac_n(n)));
    }
    for n in 200..230u16 {
        t.insert(mac_n(n), n).unwrap();
    }

    assert_eq!(t.mac_count(), 100 - 34 + 30);
    assert_consistent(&t);
}

#[test]
fn test_insert_then_lookup() {
    let (t, _) = registry();
    t.insert(mac(1), 7).unwrap();

    let e = t.lookup(&mac(1)).unwrap();
    assert_eq!(e.peer_id(), 7);
    assert_eq!(e.status(), EntryStatus::Init);
    assert_eq!(e.ip(), None);
}

#[test]
fn test_remove_is_idempotent() {
    let (t, _) = registry();
    t.insert(mac(1), 1).unwrap();
    t.insert(mac(2), 2).unwrap();

    assert!(t.remove(&mac(1)));
    assert!(t.lookup(&mac(1)).is_none());
    assert_eq!(t.mac_count(), 1);

    assert!(!t.remove(&mac(1)));
    assert_eq!(t.mac_count(), 1);
}

#[test]
fn test_timeout_marks_but_keeps() {
    let (t, clock) = registry();
    t.insert(mac(1), 1).unwrap();
    clock.advance(STALENESS + Duration::from_millis(1));

    assert_eq!(t.check_timeout(), 1);
    let e = t.lookup(&mac(1)).expect("timeout must not remove");
    assert_eq!(e.status(), EntryStatus::Suspend);

    assert_eq!(t.reap_suspended(), 1);
    assert!(t.lookup(&mac(1)).is_none());
}

#[test]
fn test_timeout_boundary_is_exclusive() {
    let (t, clock) = registry();
    t.insert(mac(1), 1).unwrap();
    clock.advance(STALENESS);

    assert_eq!(t.check_timeout(), 0);
    assert_eq!(t.lookup(&mac(1)).unwrap().status(), EntryStatus::Init);
}

#[test]
fn test_reap_removes_only_suspended() {
    let (t, _) = registry();
    let x = Ipv4Addr::new(10, 0, 0, 9);
    let a = t.insert(mac(1), 1).unwrap();
    t.insert(mac(2), 2).unwrap();
    t.insert_ip(x, &a).unwrap();
    t.update(&[mac(2)]);

    assert_eq!(t.reap_suspended(), 1);
    assert!(t.lookup(&mac(1)).is_none());
    assert!(t.lookup_ip(&x).is_none());
    assert_eq!(t.lookup(&mac(2)).unwrap().status(), EntryStatus::Init);
    assert_consistent(&t);
}

#[test]
fn test_update_suspends_unseen() {
    let (t, clock) = registry();
    t.insert(mac(1), 1).unwrap();
    t.insert(mac(2), 2).unwrap();
    clock.advance(Duration::from_secs(2));

    let outcome = t.update(&[mac(1)]);
    assert_eq!(outcome.refreshed, 1);
    assert_eq!(outcome.suspended, 1);

    let a = t.lookup(&mac(1)).unwrap();
    assert_eq!(a.status(), EntryStatus::Init);
    assert_eq!(a.last_seen_ms(), t.now_ms());
    assert_eq!(t.lookup(&mac(2)).unwrap().status(), EntryStatus::Suspend);
}

#[test]
fn test_suspend_all_is_total() {
    let (t, _) = registry();
    assert!(!t.has_suspended_entry());

    for i in 0..4 {
        t.insert(mac(i), i as u16).unwrap();
    }
    t.mark_suspend_all();

    assert!(t.has_suspended_entry());
    assert!(t.snapshot().iter().all(|s| s.status == EntryStatus::Suspend));
}
