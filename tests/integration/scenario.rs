use crate::*;
use std::net::Ipv4Addr;

use vmlink_registry::EntryStatus;

/// Two peers, one learns an IP, discovery drops it, the sweep reaps it.
#[test]
fn test_departed_peer_is_reaped_from_both_indices() {
    let (t, _) = registry();
    let a = mac(0xa);
    let b = mac(0xb);
    let ip = Ipv4Addr::new(10, 0, 0, 1);

    let entry_a = t.insert(a, 1).unwrap();
    t.insert(b, 2).unwrap();
    t.insert_ip(ip, &entry_a).unwrap();
    assert_eq!(t.lookup_ip(&ip).unwrap().mac(), a);

    let outcome = t.update(&[b]);
    assert_eq!(outcome.suspended, 1);
    assert_eq!(t.lookup(&a).unwrap().status(), EntryStatus::Suspend);

    assert_eq!(t.reap_suspended(), 1);

    assert!(t.lookup(&a).is_none());
    assert!(t.lookup_ip(&ip).is_none());
    assert!(t.lookup(&b).is_some());
    assert_eq!(t.mac_count(), 1);
    assert_eq!(t.ip_count(), 0);
    assert_consistent(&t);
}

/// A peer that comes back after being reaped is registered fresh.
#[test]
fn test_returning_peer_gets_fresh_entry() {
    let (t, _) = registry();
    let first = t.insert(mac(1), 1).unwrap();
    t.update(&[]);
    t.reap_suspended();

    let second = t.insert(mac(1), 9).unwrap();
    assert_eq!(second.peer_id(), 9);
    assert_eq!(second.status(), EntryStatus::Init);
    assert!(first.is_torn_down());
    assert!(!second.is_torn_down());
    assert_consistent(&t);
}

/// Shutdown drains everything and the registry refuses new work.
#[test]
fn test_drain_on_shutdown() {
    let (t, _) = registry();
    for i in 0..5 {
        let e = t.insert(mac(i), i as u16).unwrap();
        t.insert_ip(Ipv4Addr::new(10, 0, 0, i + 1), &e).unwrap();
    }

    assert_eq!(t.drain_all(), 5);
    assert!(t.is_empty());
    assert_eq!(t.ip_count(), 0);
    assert!(t.insert(mac(9), 9).is_err());
}
