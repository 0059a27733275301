// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owners of a session's worker process.
//!
//! An owner is any consumer whose presence requires the worker to stay
//! alive: an open tab, a scheduled task, or a response completing in the
//! background after its tab closed. Owners are set members keyed by
//! `(kind, id)`, so acquiring twice never double-counts.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of owner holding a session open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Tab,
    ScheduledTask,
    BackgroundCompletion,
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OwnerType::Tab => "tab",
            OwnerType::ScheduledTask => "scheduled_task",
            OwnerType::BackgroundCompletion => "background_completion",
        };
        f.write_str(s)
    }
}

/// A reference holder on a session's worker process.
///
/// Serializes as a tagged object:
/// - `{"type": "tab", "id": "tab-1"}`
/// - `{"type": "background_completion", "id": "sess-9"}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "type")]
    pub kind: OwnerType,
    pub id: String,
}

impl Owner {
    pub fn new(kind: OwnerType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Owner for an open UI tab.
    pub fn tab(tab_id: impl Into<String>) -> Self {
        Self::new(OwnerType::Tab, tab_id)
    }

    /// Owner for a scheduled (cron) task.
    pub fn scheduled_task(task_id: impl Into<String>) -> Self {
        Self::new(OwnerType::ScheduledTask, task_id)
    }

    /// Owner for a response completing in the background.
    ///
    /// Keyed by the session id: at most one is meaningful per session.
    pub fn background_completion(session_id: &SessionId) -> Self {
        Self::new(OwnerType::BackgroundCompletion, session_id.as_str())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
