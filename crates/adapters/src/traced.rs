// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::transport::{EventFeed, EventTransport, StreamTarget, TransportError};
use crate::worker::{WorkerAdapter, WorkerError, WorkerHandle, WorkerSpawnConfig};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any WorkerAdapter
#[derive(Clone)]
pub struct TracedWorker<W> {
    inner: W,
}

impl<W> TracedWorker<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: WorkerAdapter> WorkerAdapter for TracedWorker<W> {
    async fn spawn(&self, config: WorkerSpawnConfig) -> Result<WorkerHandle, WorkerError> {
        let span = tracing::info_span!(
            "worker.spawn",
            session_id = %config.session_id,
            workspace = %config.workspace_path.display()
        );
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.spawn(config).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(h) => tracing::info!(port = h.port, pid = ?h.pid, elapsed_ms, "worker ready"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn kill(&self, handle: &WorkerHandle) -> Result<(), WorkerError> {
        let result = self.inner.kill(handle).await;
        tracing::info_span!("worker.kill", id = %handle.id, port = handle.port).in_scope(|| {
            match &result {
                Ok(()) => tracing::info!(
                    uptime_ms = handle.started_at.elapsed().as_millis() as u64,
                    "killed"
                ),
                Err(e) => tracing::warn!(error = %e, "kill failed"),
            }
        });
        result
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let result = self.inner.is_alive(handle).await;
        tracing::trace!(port = handle.port, alive = ?result.as_ref().ok(), "checked");
        result
    }

    async fn is_busy(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let result = self.inner.is_busy(handle).await;
        match &result {
            Ok(busy) => tracing::trace!(port = handle.port, busy, "probed"),
            Err(e) => tracing::debug!(port = handle.port, error = %e, "busy probe failed"),
        }
        result
    }
}

/// Wrapper that adds tracing to any EventTransport
#[derive(Clone)]
pub struct TracedTransport<T> {
    inner: T,
}

impl<T> TracedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: EventTransport> EventTransport for TracedTransport<T> {
    async fn open(&self, target: &StreamTarget) -> Result<EventFeed, TransportError> {
        let span = tracing::info_span!(
            "transport.open",
            kind = self.inner.kind(),
            connection_id = %target.connection_id,
            url = %target.url
        );
        async {
            let start = std::time::Instant::now();
            let result = self.inner.open(target).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::debug!(elapsed_ms, "opened"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "open failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
