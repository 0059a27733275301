// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake event transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{EventFeed, EventTransport, FeedSender, StreamTarget, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sk_core::{ConnectionId, RawEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Recorded open attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCall {
    pub connection_id: ConnectionId,
    pub url: String,
    /// Tokio clock time of the attempt (paused-clock friendly).
    pub at: Instant,
}

#[derive(Default)]
struct FakeTransportState {
    opens: Vec<OpenCall>,
    scripted_failures: VecDeque<TransportError>,
    fail_all: Option<TransportError>,
    open_delay: Option<Duration>,
    live: Option<FeedSender>,
}

/// Fake transport for testing. Each successful open replaces the live feed.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeTransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded open attempts, successful or not
    pub fn opens(&self) -> Vec<OpenCall> {
        self.inner.lock().opens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().opens.len()
    }

    /// Fail the next open with `error` (queued, one per call)
    pub fn fail_next_open(&self, error: TransportError) {
        self.inner.lock().scripted_failures.push_back(error);
    }

    /// Fail every open until cleared with `None`
    pub fn set_fail_all(&self, error: Option<TransportError>) {
        self.inner.lock().fail_all = error;
    }

    /// Delay every open before it resolves
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        self.inner.lock().open_delay = delay;
    }

    /// Push an event into the live feed. Returns false if none is open.
    pub fn push_event(&self, name: &str, data: &str) -> bool {
        match &self.inner.lock().live {
            Some(tx) => tx.send(Ok(RawEvent::new(name, data))).is_ok(),
            None => false,
        }
    }

    /// Fail the live feed with a stream error and forget it.
    pub fn drop_stream(&self, reason: &str) -> bool {
        match self.inner.lock().live.take() {
            Some(tx) => tx
                .send(Err(TransportError::Stream(reason.to_string())))
                .is_ok(),
            None => false,
        }
    }

    /// Whether the most recently opened feed is still held by a reader
    pub fn is_live(&self) -> bool {
        self.inner
            .lock()
            .live
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

#[async_trait]
impl EventTransport for FakeTransport {
    async fn open(&self, target: &StreamTarget) -> Result<EventFeed, TransportError> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.opens.push(OpenCall {
                connection_id: target.connection_id.clone(),
                url: target.url.clone(),
                at: Instant::now(),
            });
            inner.open_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        if let Some(error) = inner.scripted_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = inner.fail_all.clone() {
            return Err(error);
        }
        let (tx, feed) = EventFeed::channel();
        inner.live = Some(tx);
        Ok(feed)
    }

    fn kind(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
