// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sk-engine: session ownership registry and resilient event stream clients

mod config;
mod delayed;
pub mod env;
mod error;
pub mod logging;
mod registry;
mod stream;

pub use config::{CompletionSection, Config, LogConfig, ReconnectSection, WorkerSection};
pub use delayed::DelayedTask;
pub use error::{ConfigError, RegistryError, StreamError};
pub use logging::setup_logging;
pub use registry::{
    BackgroundCompletionStart, Registry, RegistryConfig, SessionSnapshot, SessionUpgrade,
    SidecarLease,
};
pub use stream::{
    AddressResolver, EventStreamClient, EventStreamClientBuilder, SessionBinding, StreamConfig,
};
