use crate::*;
use std::net::Ipv4Addr;
use std::thread;

/// Writers churn disjoint address ranges while readers hammer lookups.
#[test]
fn test_concurrent_churn_stays_consistent() {
    let (t, _) = registry_with(7, 1024);
    let writers = 4u16;
    let per_writer = 100u16;

    thread::scope(|s| {
        for w in 0..writers {
            let t = &t;
            s.spawn(move || {
                let base = w * per_writer;
                for n in base..base + per_writer {
                    let e = t.insert(mac_n(n), n).unwrap();
                    let [hi, lo] = n.to_be_bytes();
                    t.insert_ip(Ipv4Addr::new(10, 2, hi, lo), &e).unwrap();
                }
                for n in (base..base + per_writer).filter(|n| n % 2 == 0) {
                    assert!(t.remove(&mac_n(n)));
                }
            });
        }

        for _ in 0..2 {
            let t = &t;
            s.spawn(move || {
                for _ in 0..20 {
                    for n in 0..writers * per_writer {
                        if let Some(e) = t.lookup(&mac_n(n)) {
                            assert_eq!(e.mac(), mac_n(n));
                            assert_eq!(e.peer_id(), n);
                        }
                        let [hi, lo] = n.to_be_bytes();
                        if let Some(e) = t.lookup_ip(&Ipv4Addr::new(10, 2, hi, lo)) {
                            assert_eq!(e.mac(), mac_n(n));
                        }
                    }
                }
            });
        }
    });

    assert_eq!(t.mac_count(), (writers * per_writer / 2) as usize);
    assert_eq!(t.ip_count(), (writers * per_writer / 2) as usize);
    assert_consistent(&t);
}

/// Discovery rounds racing the sweep never leave a half-linked entry.
#[test]
fn test_update_races_reap() {
    let (t, _) = registry_with(5, 256);
    for n in 0..64u16 {
        t.insert(mac_n(n), n).unwrap();
    }

    thread::scope(|s| {
        let t = &t;
        s.spawn(move || {
            for round in 0..50u16 {
                let seen: Vec<MacAddr> = (0..64u16)
                    .filter(|n| (n + round) % 3 != 0)
                    .map(mac_n)
                    .collect();
                t.update(&seen);
                for m in &seen {
                    let _ = t.insert(*m, 0);
                }
            }
        });
        s.spawn(move || {
            for _ in 0..50 {
                t.reap_suspended();
                thread::yield_now();
            }
        });
    });

    assert_consistent(&t);
}
