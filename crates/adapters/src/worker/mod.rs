// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process adapters

mod process;

pub use process::{ProcessWorkerAdapter, ProcessWorkerConfig};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorker, FakeWorkerAdapter, WorkerCall};

use async_trait::async_trait;
use sk_core::SessionId;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

sk_core::define_id! {
    /// Adapter-assigned identifier of one spawned worker process.
    pub struct WorkerId;
}

/// Errors from worker process operations
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("workspace does not exist: {0}")]
    WorkspaceMissing(PathBuf),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("worker on port {port} not ready after {waited_ms}ms")]
    StartupTimeout { port: u16, waited_ms: u64 },
    #[error("kill failed: {0}")]
    KillFailed(String),
    #[error("probe failed: {0}")]
    Probe(String),
}

/// What to start a worker for.
#[derive(Debug, Clone)]
pub struct WorkerSpawnConfig {
    pub session_id: SessionId,
    pub workspace_path: PathBuf,
}

/// Handle to a running worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    pub id: WorkerId,
    /// Port consumers dial.
    pub port: u16,
    /// OS process id, when the worker is a real process.
    pub pid: Option<u32>,
    pub workspace_path: PathBuf,
    pub started_at: Instant,
}

/// Adapter for starting, stopping and probing worker processes
#[async_trait]
pub trait WorkerAdapter: Clone + Send + Sync + 'static {
    /// Start a worker and wait until it accepts connections.
    async fn spawn(&self, config: WorkerSpawnConfig) -> Result<WorkerHandle, WorkerError>;

    /// Terminate a worker. Killing an already-dead worker succeeds.
    async fn kill(&self, handle: &WorkerHandle) -> Result<(), WorkerError>;

    /// Check whether the worker process is still running.
    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError>;

    /// Check whether the worker is producing a response right now.
    async fn is_busy(&self, handle: &WorkerHandle) -> Result<bool, WorkerError>;
}
