// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tab event stream clients

mod binding;
mod client;

pub use binding::SessionBinding;
pub use client::{EventStreamClient, EventStreamClientBuilder};

use crate::registry::Registry;
use sk_adapters::WorkerAdapter;
use sk_core::{Backoff, SessionId};

/// Looks up where a session's worker currently listens.
pub trait AddressResolver: Send + Sync + 'static {
    fn session_port(&self, session_id: &SessionId) -> Option<u16>;

    /// Current id for `session_id` (following renames) and its port.
    fn resolve(&self, session_id: &SessionId) -> (SessionId, Option<u16>) {
        (session_id.clone(), self.session_port(session_id))
    }
}

impl<W: WorkerAdapter> AddressResolver for Registry<W> {
    fn session_port(&self, session_id: &SessionId) -> Option<u16> {
        self.get_session_port(session_id)
    }

    fn resolve(&self, session_id: &SessionId) -> (SessionId, Option<u16>) {
        self.resolve_session(session_id)
    }
}

/// Connection settings shared by every client of a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Host the worker ports live on.
    pub host: String,
    pub backoff: Backoff,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            backoff: Backoff::default(),
        }
    }
}
