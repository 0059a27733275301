// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event transports: how a connection gets a live feed of worker events

mod direct;
mod proxy;
pub mod sse;

pub use direct::DirectSseTransport;
pub use proxy::{HostProxy, InProcessHostProxy, ProxiedTransport, ProxyStreamId};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, OpenCall};

use async_trait::async_trait;
use sk_core::{ConnectionId, RawEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from opening or reading an event feed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("stream endpoint returned status {0}")]
    Status(u16),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("stream closed")]
    Closed,
    #[error("host proxy error: {0}")]
    Proxy(String),
}

/// Where a connection's feed should come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub connection_id: ConnectionId,
    /// Full stream URL, e.g. `http://127.0.0.1:4100/chat/stream`.
    pub url: String,
}

impl StreamTarget {
    /// Target the worker stream endpoint on `host:port`.
    pub fn for_port(connection_id: ConnectionId, host: &str, port: u16) -> Self {
        Self {
            connection_id,
            url: format!("http://{}:{}/chat/stream", host, port),
        }
    }
}

/// One item read from a feed.
pub type FeedItem = Result<RawEvent, TransportError>;

/// Sending half handed to the task that fills a feed.
pub type FeedSender = mpsc::UnboundedSender<FeedItem>;

/// Runs a cleanup closure when dropped.
struct DropGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

/// A live, ordered feed of events for one connection.
///
/// Dropping the feed releases whatever is producing it (the reader task, the
/// host-side stream). `next` yields `None` once the producer is gone.
pub struct EventFeed {
    rx: mpsc::UnboundedReceiver<FeedItem>,
    _guard: DropGuard,
}

impl EventFeed {
    /// Create a feed and the sender that fills it.
    pub fn channel() -> (FeedSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                _guard: DropGuard(None),
            },
        )
    }

    /// Run `cleanup` when this feed is dropped.
    pub fn on_drop(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self._guard = DropGuard(Some(Box::new(cleanup)));
        self
    }

    /// Next event, error, or `None` when the producer has gone away.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }
}

/// Strategy for opening a connection's event feed.
///
/// Chosen once when a client is constructed; the client never branches on
/// which implementation it holds.
#[async_trait]
pub trait EventTransport: Clone + Send + Sync + 'static {
    /// Open a feed for `target`. Resolves once the stream is established.
    async fn open(&self, target: &StreamTarget) -> Result<EventFeed, TransportError>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
