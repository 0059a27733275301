// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

/// Worker executable override
pub fn worker_command() -> Option<String> {
    non_empty("SK_WORKER_COMMAND")
}

/// Worker host override
pub fn worker_host() -> Option<String> {
    non_empty("SK_WORKER_HOST")
}

/// Worker startup timeout override
pub fn worker_startup_ms() -> Option<Duration> {
    parse_duration_ms("SK_WORKER_STARTUP_MS")
}

/// First reconnect delay override
pub fn reconnect_base_ms() -> Option<Duration> {
    parse_duration_ms("SK_RECONNECT_BASE_MS")
}

/// Reconnect delay cap override
pub fn reconnect_max_ms() -> Option<Duration> {
    parse_duration_ms("SK_RECONNECT_MAX_MS")
}

/// Reconnect attempt budget override
pub fn reconnect_attempts() -> Option<u32> {
    std::env::var("SK_RECONNECT_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
}

/// Background completion poll interval override
pub fn completion_poll_ms() -> Option<Duration> {
    parse_duration_ms("SK_COMPLETION_POLL_MS")
}

/// Log file override
pub fn log_path() -> Option<PathBuf> {
    non_empty("SK_LOG_PATH").map(PathBuf::from)
}

/// Resolve state directory: SK_STATE_DIR > platform state dir > ~/.local/state, plus `sidekeep`
pub fn state_dir() -> Option<PathBuf> {
    if let Some(dir) = non_empty("SK_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .map(|dir| dir.join("sidekeep"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
