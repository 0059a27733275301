// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn stream_target_for_port_builds_stream_url() {
    let target = StreamTarget::for_port(ConnectionId::new("tab-1"), "127.0.0.1", 4100);
    assert_eq!(target.url, "http://127.0.0.1:4100/chat/stream");
    assert_eq!(target.connection_id, "tab-1");
}

#[tokio::test]
async fn feed_yields_items_in_order_then_none() {
    let (tx, mut feed) = EventFeed::channel();
    tx.send(Ok(RawEvent::new("chat:init", "{}"))).unwrap();
    tx.send(Err(TransportError::Closed)).unwrap();
    drop(tx);

    assert_eq!(feed.next().await, Some(Ok(RawEvent::new("chat:init", "{}"))));
    assert_eq!(feed.next().await, Some(Err(TransportError::Closed)));
    assert_eq!(feed.next().await, None);
}

#[test]
fn dropping_feed_runs_cleanup_once() {
    let cleaned = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cleaned);
    let (tx, feed) = EventFeed::channel();
    let feed = feed.on_drop(move || {
        assert!(!flag.swap(true, Ordering::SeqCst), "cleanup ran twice");
    });

    assert!(!cleaned.load(Ordering::SeqCst));
    drop(feed);
    assert!(cleaned.load(Ordering::SeqCst));
    assert!(tx.is_closed());
}
