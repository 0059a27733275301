// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tab-scoped event names for shared (proxied) transports.
//!
//! When several tabs share one host-side event channel, every event name is
//! prefixed with the owning connection id: `tab:{connection_id}:{event}`.

use crate::connection::ConnectionId;

const TAB_PREFIX: &str = "tab:";

/// Reserved event name signalling that the host-side stream for a tab ended.
pub const CLOSED_EVENT: &str = "__closed";

/// Build the tab-scoped name of an event.
pub fn scoped_event_name(connection_id: &ConnectionId, name: &str) -> String {
    format!("{}{}:{}", TAB_PREFIX, connection_id, name)
}

/// Strip the tab scope from `scoped` if it belongs to `connection_id`.
///
/// Returns `None` for events addressed to any other tab, and for unscoped
/// names. Matching is against a known id, so event names may contain `:`.
pub fn strip_tab_scope<'a>(scoped: &'a str, connection_id: &ConnectionId) -> Option<&'a str> {
    scoped
        .strip_prefix(TAB_PREFIX)?
        .strip_prefix(connection_id.as_str())?
        .strip_prefix(':')
}

#[cfg(test)]
#[path = "namespace_tests.rs"]
mod tests;
