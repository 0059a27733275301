// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn upgrade(from: &str, to: &str) -> SessionUpgrade {
    SessionUpgrade {
        from: SessionId::new(from),
        to: SessionId::new(to),
    }
}

#[test]
fn apply_only_follows_matching_session() {
    let binding = SessionBinding::bound(SessionId::new("pending-1"));

    assert!(!binding.apply(&upgrade("pending-2", "real-2")));
    assert_eq!(binding.get(), Some(SessionId::new("pending-1")));

    assert!(binding.apply(&upgrade("pending-1", "real-1")));
    assert_eq!(binding.get(), Some(SessionId::new("real-1")));
}

#[test]
fn unbound_binding_ignores_upgrades() {
    let binding = SessionBinding::default();
    assert!(!binding.apply(&upgrade("a", "b")));
    assert_eq!(binding.get(), None);
}

#[test]
fn clones_share_the_pointer() {
    let binding = SessionBinding::default();
    let clone = binding.clone();
    clone.set(Some(SessionId::new("s")));
    assert_eq!(binding.get(), Some(SessionId::new("s")));
}

#[tokio::test]
async fn follow_applies_broadcast_upgrades() {
    let (tx, rx) = broadcast::channel(8);
    let binding = SessionBinding::bound(SessionId::new("pending-1"));
    let task = binding.follow(rx);

    tx.send(upgrade("pending-1", "real-1")).unwrap();
    for _ in 0..50 {
        if binding.get() == Some(SessionId::new("real-1")) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(binding.get(), Some(SessionId::new("real-1")));

    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}
