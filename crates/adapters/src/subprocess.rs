// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess lifecycle helpers

use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// Default time a worker gets to answer `/health` after launch.
pub const WORKER_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for a killed worker to exit.
pub const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request timeout for health and state probes.
pub const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait for a child process to exit, with a timeout.
///
/// Timeout expiration and wait errors become descriptive messages. The
/// child is left in place on timeout; callers that own it decide whether
/// dropping it (and its `kill_on_drop`) is enough.
pub async fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    description: &str,
) -> Result<ExitStatus, String> {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}ms",
            description,
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
