// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live pointer from a connection to its current session id

use crate::registry::SessionUpgrade;
use parking_lot::RwLock;
use sk_core::SessionId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Shared, mutable session id for one connection.
///
/// Clones share the same pointer. Upgrades applied through any clone are
/// seen by the next address lookup of every holder.
#[derive(Debug, Clone, Default)]
pub struct SessionBinding {
    current: Arc<RwLock<Option<SessionId>>>,
}

impl SessionBinding {
    pub fn new(session_id: Option<SessionId>) -> Self {
        Self {
            current: Arc::new(RwLock::new(session_id)),
        }
    }

    pub fn bound(session_id: SessionId) -> Self {
        Self::new(Some(session_id))
    }

    pub fn get(&self) -> Option<SessionId> {
        self.current.read().clone()
    }

    /// Rebind (or unbind with `None`), e.g. when a tab switches sessions.
    pub fn set(&self, session_id: Option<SessionId>) {
        *self.current.write() = session_id;
    }

    /// Follow an upgrade if it renames the bound session.
    pub fn apply(&self, upgrade: &SessionUpgrade) -> bool {
        let mut current = self.current.write();
        if current.as_ref() == Some(&upgrade.from) {
            *current = Some(upgrade.to.clone());
            return true;
        }
        false
    }

    /// Apply every upgrade from `upgrades` until the channel closes.
    ///
    /// Abort the returned task to stop following.
    pub fn follow(&self, mut upgrades: broadcast::Receiver<SessionUpgrade>) -> JoinHandle<()> {
        let binding = self.clone();
        tokio::spawn(async move {
            loop {
                match upgrades.recv().await {
                    Ok(upgrade) => {
                        if binding.apply(&upgrade) {
                            tracing::debug!(from = %upgrade.from, to = %upgrade.to, "binding followed upgrade");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "session binding missed upgrades");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
