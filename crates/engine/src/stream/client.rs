// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream client: one live, typed event feed per tab.
//!
//! The connection is an explicit state machine with one authoritative state
//! and a single retry slot. Every `connect()`/`disconnect()` starts a new
//! generation; reader and retry tasks carry the generation they were started
//! under and become no-ops once it is stale.

use super::{AddressResolver, SessionBinding, StreamConfig};
use crate::delayed::DelayedTask;
use crate::error::StreamError;
use crate::registry::SessionUpgrade;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::cell::Cell;
use serde_json::Value;
use sk_adapters::{EventFeed, EventTransport, StreamTarget, TransportError};
use sk_core::{decode, ConnectionId, ConnectionState, ConnectionStatus, Decoded, RawEvent, SessionId};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

type EventHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;
type StatusHandler = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// A status to report, stamped with the transition that produced it.
struct Notice {
    seq: u64,
    status: ConnectionStatus,
}

struct ConnectionCore {
    state: ConnectionState,
    /// Count of state transitions, for ordering status reports.
    transitions: u64,
    generation: u64,
    attempts: u32,
    retry: DelayedTask,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionCore {
    fn transition(&mut self, connection_id: &ConnectionId, target: ConnectionState) -> Option<Notice> {
        if !self.state.can_transition_to(target) {
            tracing::error!(%connection_id, from = %self.state, to = %target, "unexpected connection transition");
        }
        self.state = target;
        self.transitions += 1;
        target.status().map(|status| Notice {
            seq: self.transitions,
            status,
        })
    }

    /// Start a new generation, cancelling the retry and the reader.
    fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.retry.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.attempts = 0;
        self.generation
    }
}

struct Shared<T> {
    connection_id: ConnectionId,
    transport: T,
    config: StreamConfig,
    resolver: Option<Arc<dyn AddressResolver>>,
    binding: SessionBinding,
    legacy_port: Option<u16>,
    core: Mutex<ConnectionCore>,
    /// Serialises handler calls and holds the last reported transition.
    /// Reentrant so handlers may call back into the client.
    delivery: ReentrantMutex<Cell<u64>>,
    on_event: RwLock<Option<EventHandler>>,
    on_status: RwLock<Option<StatusHandler>>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.retry.cancel();
        if let Some(reader) = core.reader.take() {
            reader.abort();
        }
    }
}

impl<T: EventTransport> Shared<T> {
    /// Resolve the stream address fresh: the bound session's port, or the
    /// legacy per-tab port when no session is bound.
    fn resolve_target(&self) -> Result<StreamTarget, StreamError> {
        let port = match (self.binding.get(), &self.resolver) {
            (Some(bound), Some(resolver)) => {
                let (current, port) = resolver.resolve(&bound);
                if current != bound
                    && self.binding.apply(&SessionUpgrade {
                        from: bound,
                        to: current,
                    })
                {
                    tracing::debug!(connection_id = %self.connection_id, "binding followed session rename");
                }
                port
            }
            _ => self.legacy_port,
        };
        let port = port.ok_or_else(|| StreamError::NoAddress(self.connection_id.to_string()))?;
        Ok(StreamTarget::for_port(
            self.connection_id.clone(),
            &self.config.host,
            port,
        ))
    }

    async fn open(&self) -> Result<EventFeed, StreamError> {
        let target = self.resolve_target()?;
        Ok(self.transport.open(&target).await?)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.core.lock().generation == generation
    }

    /// Report a transition unless a later one was already reported, so the
    /// last status a handler sees always matches the final state.
    fn notify(&self, notice: Option<Notice>) {
        let Some(notice) = notice else {
            return;
        };
        let delivered = self.delivery.lock();
        if notice.seq <= delivered.get() {
            return;
        }
        delivered.set(notice.seq);
        let handler = self.on_status.read().clone();
        if let Some(handler) = handler {
            handler(notice.status);
        }
    }

    fn dispatch(&self, generation: u64, event: RawEvent) {
        if !self.is_current(generation) {
            return;
        }
        let payload = match decode(&event) {
            Decoded::Payload(value) => value,
            Decoded::Malformed(e) => {
                tracing::warn!(connection_id = %self.connection_id, event = %event.name, error = %e, "malformed payload, delivering null");
                Value::Null
            }
            Decoded::Unrecognized => {
                tracing::error!(connection_id = %self.connection_id, event = %event.name, "unrecognized event dropped");
                return;
            }
        };
        let _delivery = self.delivery.lock();
        if !self.is_current(generation) {
            return;
        }
        let handler = self.on_event.read().clone();
        if let Some(handler) = handler {
            handler(&event.name, payload);
        }
    }

    fn connected(
        self: &Arc<Self>,
        core: &mut ConnectionCore,
        generation: u64,
        feed: EventFeed,
    ) -> Option<Notice> {
        core.reader = Some(tokio::spawn(read_feed(
            Arc::downgrade(self),
            generation,
            feed,
        )));
        core.attempts = 0;
        tracing::info!(connection_id = %self.connection_id, transport = self.transport.kind(), "connected");
        core.transition(&self.connection_id, ConnectionState::Connected)
    }

    /// Feed a failure into the reconnect machine: schedule the next retry,
    /// or give up once the attempt budget is spent.
    fn failed(
        self: &Arc<Self>,
        core: &mut ConnectionCore,
        generation: u64,
        error: &StreamError,
    ) -> Option<Notice> {
        let attempt = core.attempts + 1;
        match self.config.backoff.delay_for(attempt) {
            Some(delay) => {
                core.attempts = attempt;
                tracing::warn!(
                    connection_id = %self.connection_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "stream unavailable, retrying"
                );
                let shared = Arc::downgrade(self);
                core.retry.schedule(delay, async move {
                    if let Some(shared) = shared.upgrade() {
                        shared.retry(generation).await;
                    }
                });
                core.transition(&self.connection_id, ConnectionState::Reconnecting)
            }
            None => {
                tracing::error!(
                    connection_id = %self.connection_id,
                    attempts = core.attempts,
                    error = %error,
                    "reconnect attempts exhausted"
                );
                core.transition(&self.connection_id, ConnectionState::Failed)
            }
        }
    }

    async fn retry(self: Arc<Self>, generation: u64) {
        {
            let mut core = self.core.lock();
            if core.generation != generation || core.state != ConnectionState::Reconnecting {
                return;
            }
            // The timer has fired; this task now owns the attempt
            core.retry.detach();
            tracing::debug!(connection_id = %self.connection_id, attempt = core.attempts, "reconnecting");
        }

        let result = self.open().await;
        let status = {
            let mut core = self.core.lock();
            if core.generation != generation {
                return;
            }
            match result {
                Ok(feed) => self.connected(&mut core, generation, feed),
                Err(e) => self.failed(&mut core, generation, &e),
            }
        };
        self.notify(status);
    }

    fn stream_lost(self: &Arc<Self>, generation: u64, error: TransportError) {
        let status = {
            let mut core = self.core.lock();
            if core.generation != generation || core.state != ConnectionState::Connected {
                return;
            }
            // Called from the reader itself; let it finish on its own
            core.reader = None;
            self.failed(&mut core, generation, &StreamError::Transport(error))
        };
        self.notify(status);
    }
}

/// Deliver events in arrival order until the feed fails or ends.
async fn read_feed<T: EventTransport>(shared: Weak<Shared<T>>, generation: u64, mut feed: EventFeed) {
    let error = loop {
        match feed.next().await {
            Some(Ok(event)) => match shared.upgrade() {
                Some(shared) => shared.dispatch(generation, event),
                None => return,
            },
            Some(Err(e)) => break e,
            None => break TransportError::Closed,
        }
    };
    // Release the transport before a retry can open a new one
    drop(feed);
    if let Some(shared) = shared.upgrade() {
        shared.stream_lost(generation, error);
    }
}

/// Resilient event stream for one UI surface
pub struct EventStreamClient<T> {
    shared: Arc<Shared<T>>,
}

impl<T: EventTransport> EventStreamClient<T> {
    pub fn builder(connection_id: ConnectionId, transport: T) -> EventStreamClientBuilder<T> {
        EventStreamClientBuilder {
            connection_id,
            transport,
            config: StreamConfig::default(),
            resolver: None,
            binding: SessionBinding::default(),
            legacy_port: None,
        }
    }

    /// Open the stream, replacing any current connection or pending retry.
    ///
    /// A failure is returned for information only: it has already entered
    /// the reconnect machine, which keeps retrying in the background.
    pub async fn connect(&self) -> Result<(), StreamError> {
        let shared = &self.shared;
        let generation = {
            let mut core = shared.core.lock();
            let generation = core.reset();
            core.transition(&shared.connection_id, ConnectionState::Connecting);
            generation
        };
        tracing::debug!(connection_id = %shared.connection_id, transport = shared.transport.kind(), "connecting");

        let result = shared.open().await;
        let (status, outcome) = {
            let mut core = shared.core.lock();
            if core.generation != generation {
                return Err(StreamError::Cancelled);
            }
            match result {
                Ok(feed) => (shared.connected(&mut core, generation, feed), Ok(())),
                Err(e) => (shared.failed(&mut core, generation, &e), Err(e)),
            }
        };
        shared.notify(status);
        outcome
    }

    /// Stop streaming and cancel any pending retry. Never awaits; repeat
    /// calls are no-ops.
    ///
    /// Once this returns no further event from the old stream is delivered.
    /// A handler call already in progress on another thread is waited for.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        let status = {
            let mut core = shared.core.lock();
            core.reset();
            if core.state == ConnectionState::Disconnected {
                None
            } else {
                core.transition(&shared.connection_id, ConnectionState::Disconnected)
            }
        };
        match status {
            Some(notice) => {
                tracing::info!(connection_id = %shared.connection_id, "disconnected");
                shared.notify(Some(notice));
            }
            // Still wait out any in-flight handler call
            None => drop(shared.delivery.lock()),
        }
    }

    /// Handler receiving `(event name, decoded payload)` for every delivered event.
    pub fn set_event_handler(&self, handler: impl Fn(&str, Value) + Send + Sync + 'static) {
        *self.shared.on_event.write() = Some(Arc::new(handler));
    }

    pub fn set_status_handler(&self, handler: impl Fn(ConnectionStatus) + Send + Sync + 'static) {
        *self.shared.on_status.write() = Some(Arc::new(handler));
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.core.lock().state
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.core.lock().attempts
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.shared.connection_id
    }

    pub fn session_binding(&self) -> &SessionBinding {
        &self.shared.binding
    }
}

/// Builder for [`EventStreamClient`]
pub struct EventStreamClientBuilder<T> {
    connection_id: ConnectionId,
    transport: T,
    config: StreamConfig,
    resolver: Option<Arc<dyn AddressResolver>>,
    binding: SessionBinding,
    legacy_port: Option<u16>,
}

impl<T: EventTransport> EventStreamClientBuilder<T> {
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve session ports through `resolver` (usually the registry).
    pub fn resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Share an existing binding, e.g. one that follows registry upgrades.
    pub fn binding(mut self, binding: SessionBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn session(self, session_id: SessionId) -> Self {
        self.binding.set(Some(session_id));
        self
    }

    /// Port to dial while no session is bound.
    pub fn legacy_port(mut self, port: u16) -> Self {
        self.legacy_port = Some(port);
        self
    }

    pub fn build(self) -> EventStreamClient<T> {
        EventStreamClient {
            shared: Arc::new(Shared {
                connection_id: self.connection_id,
                transport: self.transport,
                config: self.config,
                resolver: self.resolver,
                binding: self.binding,
                legacy_port: self.legacy_port,
                core: Mutex::new(ConnectionCore {
                    state: ConnectionState::Disconnected,
                    transitions: 0,
                    generation: 0,
                    attempts: 0,
                    retry: DelayedTask::new(),
                    reader: None,
                }),
                delivery: ReentrantMutex::new(Cell::new(0)),
                on_event: RwLock::new(None),
                on_status: RwLock::new(None),
            }),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
