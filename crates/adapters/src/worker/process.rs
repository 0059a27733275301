// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process worker adapter

use super::{WorkerAdapter, WorkerError, WorkerHandle, WorkerId, WorkerSpawnConfig};
use crate::subprocess::{wait_with_timeout, HEALTH_REQUEST_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::TcpListener;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// Settings for launching worker processes.
#[derive(Debug, Clone)]
pub struct ProcessWorkerConfig {
    /// Worker executable.
    pub command: String,
    /// Arguments placed before `--port`/`--workspace`.
    pub args: Vec<String>,
    /// Host the worker binds and consumers dial.
    pub host: String,
    /// How long to wait for `/health` after launch.
    pub startup_timeout: Duration,
    /// How long to wait for exit after SIGKILL.
    pub shutdown_timeout: Duration,
    /// Interval between readiness probes.
    pub health_poll_interval: Duration,
}

impl Default for ProcessWorkerConfig {
    fn default() -> Self {
        Self {
            command: "sk-worker".to_string(),
            args: Vec::new(),
            host: "127.0.0.1".to_string(),
            startup_timeout: crate::subprocess::WORKER_STARTUP_TIMEOUT,
            shutdown_timeout: crate::subprocess::WORKER_SHUTDOWN_TIMEOUT,
            health_poll_interval: crate::env::health_poll_ms(),
        }
    }
}

/// Runs one worker executable per session.
#[derive(Clone)]
pub struct ProcessWorkerAdapter {
    config: Arc<ProcessWorkerConfig>,
    client: reqwest::Client,
    children: Arc<Mutex<HashMap<WorkerId, Child>>>,
}

impl ProcessWorkerAdapter {
    pub fn new(config: ProcessWorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.config.host, port)
    }

    /// Ask the OS for a free port. The listener is dropped before the
    /// worker binds, so the port is only reserved, not held.
    fn reserve_port(&self) -> Result<u16, WorkerError> {
        let listener = TcpListener::bind((self.config.host.as_str(), 0))
            .map_err(|e| WorkerError::SpawnFailed(format!("no free port: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| WorkerError::SpawnFailed(format!("no free port: {}", e)))?
            .port();
        Ok(port)
    }

    async fn wait_for_health(&self, id: &WorkerId, port: u16) -> Result<(), WorkerError> {
        let health_url = format!("{}/health", self.base_url(port));
        let started = Instant::now();
        while started.elapsed() <= self.config.startup_timeout {
            if let Some(status) = self.exit_status(id) {
                return Err(WorkerError::SpawnFailed(format!(
                    "worker exited during startup ({})",
                    status
                )));
            }
            let check = self
                .client
                .get(health_url.as_str())
                .timeout(HEALTH_REQUEST_TIMEOUT)
                .send()
                .await;
            if let Ok(response) = check {
                if response.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(self.config.health_poll_interval).await;
        }
        Err(WorkerError::StartupTimeout {
            port,
            waited_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Exit status if the child has already exited.
    fn exit_status(&self, id: &WorkerId) -> Option<std::process::ExitStatus> {
        let mut children = self.children.lock();
        let child = children.get_mut(id)?;
        child.try_wait().ok().flatten()
    }

    async fn terminate(&self, id: &WorkerId) -> Result<(), WorkerError> {
        let child = self.children.lock().remove(id);
        let Some(mut child) = child else {
            return Ok(());
        };
        if let Err(e) = child.start_kill() {
            // InvalidInput means the child already exited and was reaped
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(WorkerError::KillFailed(e.to_string()));
            }
        }
        wait_with_timeout(&mut child, self.config.shutdown_timeout, "worker shutdown")
            .await
            .map(|_| ())
            .map_err(WorkerError::KillFailed)
    }
}

#[async_trait]
impl WorkerAdapter for ProcessWorkerAdapter {
    async fn spawn(&self, config: WorkerSpawnConfig) -> Result<WorkerHandle, WorkerError> {
        // Precondition: workspace must exist
        if !config.workspace_path.is_dir() {
            return Err(WorkerError::WorkspaceMissing(config.workspace_path));
        }

        let port = self.reserve_port()?;
        let id = WorkerId::new(format!("{}@{}", config.session_id, port));

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg("--port")
            .arg(port.to_string())
            .arg("--workspace")
            .arg(&config.workspace_path)
            .current_dir(&config.workspace_path)
            .env("SK_SESSION_ID", config.session_id.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            WorkerError::SpawnFailed(format!("failed to start '{}': {}", self.config.command, e))
        })?;
        let pid = child.id();
        self.children.lock().insert(id.clone(), child);

        if let Err(e) = self.wait_for_health(&id, port).await {
            if let Err(kill_err) = self.terminate(&id).await {
                tracing::warn!(%id, error = %kill_err, "failed to clean up worker after startup failure");
            }
            return Err(e);
        }

        Ok(WorkerHandle {
            id,
            port,
            pid,
            workspace_path: config.workspace_path,
            started_at: Instant::now(),
        })
    }

    async fn kill(&self, handle: &WorkerHandle) -> Result<(), WorkerError> {
        self.terminate(&handle.id).await
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let mut children = self.children.lock();
        match children.get_mut(&handle.id) {
            Some(child) => match child.try_wait() {
                Ok(None) => Ok(true),
                Ok(Some(_)) => Ok(false),
                Err(e) => Err(WorkerError::Probe(e.to_string())),
            },
            None => Ok(false),
        }
    }

    async fn is_busy(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let url = format!("{}/chat/state", self.base_url(handle.port));
        let response = self
            .client
            .get(url.as_str())
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkerError::Probe(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WorkerError::Probe(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WorkerError::Probe(e.to_string()))?;
        Ok(body
            .get("isStreaming")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
