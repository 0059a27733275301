// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake worker adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{WorkerAdapter, WorkerError, WorkerHandle, WorkerId, WorkerSpawnConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use sk_core::SessionId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// First port handed out by the fake.
const FIRST_PORT: u16 = 41000;

/// Recorded worker call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCall {
    Spawn {
        session_id: SessionId,
        workspace_path: PathBuf,
    },
    Kill {
        port: u16,
    },
    IsAlive {
        port: u16,
    },
    IsBusy {
        port: u16,
    },
}

/// Fake worker state
#[derive(Debug, Clone)]
pub struct FakeWorker {
    pub session_id: SessionId,
    pub workspace_path: PathBuf,
    pub alive: bool,
    pub busy: bool,
}

struct FakeWorkerState {
    workers: HashMap<u16, FakeWorker>,
    calls: Vec<WorkerCall>,
    next_port: u16,
    spawn_error: Option<String>,
    kill_error: Option<String>,
    spawn_delay: Option<Duration>,
}

/// Fake worker adapter for testing
#[derive(Clone)]
pub struct FakeWorkerAdapter {
    inner: Arc<Mutex<FakeWorkerState>>,
}

impl Default for FakeWorkerAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeWorkerState {
                workers: HashMap::new(),
                calls: Vec::new(),
                next_port: FIRST_PORT,
                spawn_error: None,
                kill_error: None,
                spawn_delay: None,
            })),
        }
    }
}

impl FakeWorkerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<WorkerCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of spawn calls, successful or not
    pub fn spawn_count(&self) -> usize {
        self.count(|call| matches!(call, WorkerCall::Spawn { .. }))
    }

    /// Number of kill calls
    pub fn kill_count(&self) -> usize {
        self.count(|call| matches!(call, WorkerCall::Kill { .. }))
    }

    fn count(&self, pred: impl Fn(&WorkerCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Get a worker by port
    pub fn get_worker(&self, port: u16) -> Option<FakeWorker> {
        self.inner.lock().workers.get(&port).cloned()
    }

    /// Ports of workers that are still running
    pub fn live_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .inner
            .lock()
            .workers
            .iter()
            .filter(|(_, w)| w.alive)
            .map(|(port, _)| *port)
            .collect();
        ports.sort_unstable();
        ports
    }

    /// Make subsequent spawns fail (or succeed again with `None`)
    pub fn set_spawn_error(&self, error: Option<&str>) {
        self.inner.lock().spawn_error = error.map(str::to_string);
    }

    /// Make subsequent kills fail (the worker still dies)
    pub fn set_kill_error(&self, error: Option<&str>) {
        self.inner.lock().kill_error = error.map(str::to_string);
    }

    /// Delay every spawn, to widen race windows in tests
    pub fn set_spawn_delay(&self, delay: Option<Duration>) {
        self.inner.lock().spawn_delay = delay;
    }

    /// Mark a worker as crashed
    pub fn set_dead(&self, port: u16) {
        if let Some(worker) = self.inner.lock().workers.get_mut(&port) {
            worker.alive = false;
        }
    }

    /// Set whether a worker is producing a response
    pub fn set_busy(&self, port: u16, busy: bool) {
        if let Some(worker) = self.inner.lock().workers.get_mut(&port) {
            worker.busy = busy;
        }
    }
}

#[async_trait]
impl WorkerAdapter for FakeWorkerAdapter {
    async fn spawn(&self, config: WorkerSpawnConfig) -> Result<WorkerHandle, WorkerError> {
        let delay = self.inner.lock().spawn_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::Spawn {
            session_id: config.session_id.clone(),
            workspace_path: config.workspace_path.clone(),
        });

        if let Some(error) = inner.spawn_error.clone() {
            return Err(WorkerError::SpawnFailed(error));
        }

        let port = inner.next_port;
        inner.next_port += 1;
        inner.workers.insert(
            port,
            FakeWorker {
                session_id: config.session_id.clone(),
                workspace_path: config.workspace_path.clone(),
                alive: true,
                busy: false,
            },
        );

        Ok(WorkerHandle {
            id: WorkerId::new(format!("fake-{}", port)),
            port,
            pid: None,
            workspace_path: config.workspace_path,
            started_at: Instant::now(),
        })
    }

    async fn kill(&self, handle: &WorkerHandle) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::Kill { port: handle.port });

        if let Some(worker) = inner.workers.get_mut(&handle.port) {
            worker.alive = false;
            worker.busy = false;
        }

        match inner.kill_error.clone() {
            Some(error) => Err(WorkerError::KillFailed(error)),
            None => Ok(()),
        }
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::IsAlive { port: handle.port });
        Ok(inner
            .workers
            .get(&handle.port)
            .map(|w| w.alive)
            .unwrap_or(false))
    }

    async fn is_busy(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::IsBusy { port: handle.port });
        match inner.workers.get(&handle.port) {
            Some(worker) if worker.alive => Ok(worker.busy),
            _ => Err(WorkerError::Probe(format!(
                "no worker on port {}",
                handle.port
            ))),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
