// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state machine for per-tab event streams.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Identifier of the UI surface owning an event stream connection.
    ///
    /// Doubles as the tab id used to namespace proxied event names.
    pub struct ConnectionId;
}

/// Transport state of one event stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retries exhausted. Terminal until an explicit `connect()`.
    Failed,
}

impl ConnectionState {
    /// Check whether the state machine permits moving to `target`.
    ///
    /// An explicit connect or disconnect is accepted from anywhere; every
    /// other edge is driven by transport events.
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, target),
            (_, Connecting) | (_, Disconnected) |
            (Connecting, Connected) | (Connecting, Reconnecting) |
            (Connected, Reconnecting) |
            (Reconnecting, Connected) | (Reconnecting, Reconnecting) | (Reconnecting, Failed)
        )
    }

    /// Status reported to the UI for this state, if any.
    ///
    /// `Connecting` is transient and not reported.
    pub fn status(&self) -> Option<ConnectionStatus> {
        match self {
            ConnectionState::Disconnected => Some(ConnectionStatus::Disconnected),
            ConnectionState::Connecting => None,
            ConnectionState::Connected => Some(ConnectionStatus::Connected),
            ConnectionState::Reconnecting => Some(ConnectionStatus::Reconnecting),
            ConnectionState::Failed => Some(ConnectionStatus::Failed),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status delivered to a connection's status handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
    Failed,
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
