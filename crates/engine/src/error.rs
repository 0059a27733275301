// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use sk_adapters::{TransportError, WorkerError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to start worker: {0}")]
    Spawn(#[from] WorkerError),
}

/// Errors from an event stream client's connect call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("no address to connect to for connection {0}")]
    NoAddress(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connect cancelled by disconnect")]
    Cancelled,
}

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
