// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide logging setup for hosts embedding the engine

use crate::config::LogConfig;
use crate::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "sidekeep.log";

/// Log file to write: configured path, else `<state dir>/sidekeep.log`.
pub fn log_file_path(config: &LogConfig) -> io::Result<PathBuf> {
    if let Some(path) = &config.path {
        return Ok(path.clone());
    }
    env::state_dir()
        .map(|dir| dir.join(LOG_FILE_NAME))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no state directory for logs"))
}

/// `RUST_LOG` if set and valid, otherwise the configured directive.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

fn split_log_path(path: &Path) -> io::Result<(&Path, &std::ffi::OsStr)> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name");
    let file_name = path.file_name().ok_or_else(invalid)?;
    let dir = path.parent().ok_or_else(invalid)?;
    Ok((dir, file_name))
}

/// Install the global subscriber writing to the log file.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer.
pub fn setup_logging(config: &LogConfig) -> io::Result<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*};

    let path = log_file_path(config)?;
    let (dir, file_name) = split_log_path(&path)?;
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
