// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Worker readiness poll interval (default: 100ms).
pub fn health_poll_ms() -> Duration {
    parse_duration_ms("SK_HEALTH_POLL_MS").unwrap_or(Duration::from_millis(100))
}

/// Time an open transport waits for the first byte before giving up
/// (default: 10000ms).
pub fn connect_timeout_ms() -> Duration {
    parse_duration_ms("SK_CONNECT_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
