// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: worker processes and event transports

mod env;
pub mod subprocess;
pub mod traced;
pub mod transport;
pub mod worker;

pub use traced::{TracedTransport, TracedWorker};
pub use transport::{
    DirectSseTransport, EventFeed, EventTransport, FeedItem, FeedSender, HostProxy,
    InProcessHostProxy, ProxiedTransport, ProxyStreamId, StreamTarget, TransportError,
};
pub use worker::{
    ProcessWorkerAdapter, ProcessWorkerConfig, WorkerAdapter, WorkerError, WorkerHandle,
    WorkerId, WorkerSpawnConfig,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeTransport, OpenCall};
#[cfg(any(test, feature = "test-support"))]
pub use worker::{FakeWorker, FakeWorkerAdapter, WorkerCall};
