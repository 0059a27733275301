// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sk-core: data model for session-owned worker processes and their event streams

pub mod backoff;
pub mod connection;
pub mod event;
pub mod id;
pub mod namespace;
pub mod owner;
pub mod session;

pub use backoff::Backoff;
pub use connection::{ConnectionId, ConnectionState, ConnectionStatus};
pub use event::{classify, decode, Decoded, PayloadKind, RawEvent};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use namespace::{scoped_event_name, strip_tab_scope, CLOSED_EVENT};
pub use owner::{Owner, OwnerType};
pub use session::SessionId;
