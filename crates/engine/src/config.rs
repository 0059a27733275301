// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Loaded from an optional TOML file, then overridden by `SK_*` environment
//! variables, then validated. Every field has a default, so an absent file
//! and an empty file mean the same thing.

use crate::env;
use crate::error::ConfigError;
use crate::registry::RegistryConfig;
use crate::stream::StreamConfig;
use serde::{Deserialize, Serialize};
use sk_adapters::ProcessWorkerConfig;
use sk_core::Backoff;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub worker: WorkerSection,
    pub reconnect: ReconnectSection,
    pub completion: CompletionSection,
    pub log: LogConfig,
}

/// `[worker]`: how worker processes are launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    pub command: String,
    pub args: Vec<String>,
    pub host: String,
    pub startup_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        let defaults = ProcessWorkerConfig::default();
        Self {
            command: defaults.command,
            args: defaults.args,
            host: defaults.host,
            startup_timeout_ms: defaults.startup_timeout.as_millis() as u64,
            shutdown_timeout_ms: defaults.shutdown_timeout.as_millis() as u64,
        }
    }
}

/// `[reconnect]`: event stream backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectSection {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            base_delay_ms: backoff.base_delay.as_millis() as u64,
            max_delay_ms: backoff.max_delay.as_millis() as u64,
            max_attempts: backoff.max_attempts,
        }
    }
}

/// `[completion]`: background completion watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionSection {
    pub poll_interval_ms: u64,
    pub max_duration_ms: u64,
}

impl Default for CompletionSection {
    fn default() -> Self {
        let defaults = RegistryConfig::default();
        Self {
            poll_interval_ms: defaults.completion_poll_interval.as_millis() as u64,
            max_duration_ms: defaults.completion_max_duration.as_millis() as u64,
        }
    }
}

/// `[log]`: where logs go and what gets through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Log file; defaults to `<state dir>/sidekeep.log`.
    pub path: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (if given and present), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(content) => Self::from_toml(&content)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(source) => {
                    return Err(ConfigError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            },
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without environment overrides or validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `SK_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Some(command) = env::worker_command() {
            self.worker.command = command;
        }
        if let Some(host) = env::worker_host() {
            self.worker.host = host;
        }
        if let Some(startup) = env::worker_startup_ms() {
            self.worker.startup_timeout_ms = startup.as_millis() as u64;
        }
        if let Some(base) = env::reconnect_base_ms() {
            self.reconnect.base_delay_ms = base.as_millis() as u64;
        }
        if let Some(max) = env::reconnect_max_ms() {
            self.reconnect.max_delay_ms = max.as_millis() as u64;
        }
        if let Some(attempts) = env::reconnect_attempts() {
            self.reconnect.max_attempts = attempts;
        }
        if let Some(poll) = env::completion_poll_ms() {
            self.completion.poll_interval_ms = poll.as_millis() as u64;
        }
        if let Some(path) = env::log_path() {
            self.log.path = Some(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.command.trim().is_empty() {
            return Err(ConfigError::Invalid("worker.command is empty".to_string()));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect.base_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.reconnect.base_delay_ms, self.reconnect.max_delay_ms
            )));
        }
        if self.completion.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "completion.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.completion.max_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "completion.max_duration_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            self.reconnect.max_attempts,
        )
    }

    pub fn process_worker(&self) -> ProcessWorkerConfig {
        ProcessWorkerConfig {
            command: self.worker.command.clone(),
            args: self.worker.args.clone(),
            host: self.worker.host.clone(),
            startup_timeout: Duration::from_millis(self.worker.startup_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.worker.shutdown_timeout_ms),
            ..ProcessWorkerConfig::default()
        }
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            completion_poll_interval: Duration::from_millis(self.completion.poll_interval_ms),
            completion_max_duration: Duration::from_millis(self.completion.max_duration_ms),
        }
    }

    pub fn stream(&self) -> StreamConfig {
        StreamConfig {
            host: self.worker.host.clone(),
            backoff: self.backoff(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
