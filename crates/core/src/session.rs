// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier type.
//!
//! A session is the logical conversation/workspace context that owns a
//! worker process. Sessions may start under a placeholder id (assigned before
//! the backend confirms a durable one) and are upgraded in place later.

use crate::id::IdGen;

/// Prefix marking a placeholder session id.
pub const PLACEHOLDER_PREFIX: &str = "pending-";

crate::define_id! {
    /// Unique identifier for a session.
    pub struct SessionId;
}

impl SessionId {
    /// Allocate a placeholder id to use until the backend assigns a real one.
    pub fn placeholder(id_gen: &impl IdGen) -> Self {
        Self(format!("{}{}", PLACEHOLDER_PREFIX, id_gen.next()))
    }

    /// Returns true if this id has not been upgraded to a durable id yet.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
