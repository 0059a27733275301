// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-proxied transport.
//!
//! Some clients cannot dial the worker themselves. They ask a privileged
//! host to dial on their behalf; the host republishes every frame with the
//! name scoped to the requesting tab, and each connection keeps only its own
//! frames. The in-process host gives every tab its own channel so a burst on
//! one tab cannot push another tab's receiver past capacity.

use super::{DirectSseTransport, EventFeed, EventTransport, StreamTarget, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sk_core::{scoped_event_name, strip_tab_scope, ConnectionId, RawEvent, CLOSED_EVENT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of each tab's host channel. A tab that falls this far behind
/// loses its feed and reconnects; other tabs are unaffected.
const HOST_CHANNEL_CAPACITY: usize = 1024;

/// Identifies one host-side stream, so a late stop for an old stream cannot
/// tear down its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyStreamId(pub u64);

/// Privileged side of the proxied transport
#[async_trait]
pub trait HostProxy: Clone + Send + Sync + 'static {
    /// Dial `url` for `connection_id` and publish its frames as
    /// `tab:<connection_id>:<event>`. Replaces any stream already running for
    /// that connection.
    async fn start_stream(
        &self,
        connection_id: &ConnectionId,
        url: &str,
    ) -> Result<ProxyStreamId, TransportError>;

    /// Stop a stream if it is still the current one for `connection_id`.
    fn stop_stream(&self, connection_id: &ConnectionId, stream: ProxyStreamId);

    /// Subscribe to the frames published for `connection_id`. Hosts may
    /// share one channel between tabs; receivers filter by scope either way.
    fn subscribe(&self, connection_id: &ConnectionId) -> broadcast::Receiver<RawEvent>;
}

struct HostStream {
    id: ProxyStreamId,
    task: JoinHandle<()>,
}

struct HostState {
    direct: DirectSseTransport,
    channels: Mutex<HashMap<ConnectionId, broadcast::Sender<RawEvent>>>,
    streams: Mutex<HashMap<ConnectionId, HostStream>>,
    next_id: AtomicU64,
}

/// Host proxy that dials with the direct SSE code path inside the host process.
#[derive(Clone)]
pub struct InProcessHostProxy {
    state: Arc<HostState>,
}

impl Default for InProcessHostProxy {
    fn default() -> Self {
        Self::new(DirectSseTransport::new())
    }
}

impl InProcessHostProxy {
    pub fn new(direct: DirectSseTransport) -> Self {
        Self {
            state: Arc::new(HostState {
                direct,
                channels: Mutex::new(HashMap::new()),
                streams: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of host-side streams currently registered.
    pub fn active_streams(&self) -> usize {
        self.state.streams.lock().len()
    }

    fn channel_for(&self, connection_id: &ConnectionId) -> broadcast::Sender<RawEvent> {
        let mut channels = self.state.channels.lock();
        // Tabs that went away leave senders nobody listens to
        channels.retain(|id, tx| id == connection_id || tx.receiver_count() > 0);
        channels
            .entry(connection_id.clone())
            .or_insert_with(|| broadcast::channel(HOST_CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl HostProxy for InProcessHostProxy {
    async fn start_stream(
        &self,
        connection_id: &ConnectionId,
        url: &str,
    ) -> Result<ProxyStreamId, TransportError> {
        let target = StreamTarget {
            connection_id: connection_id.clone(),
            url: url.to_string(),
        };
        let mut feed = self.state.direct.open(&target).await?;

        let id = ProxyStreamId(self.state.next_id.fetch_add(1, Ordering::Relaxed));
        let channel = self.channel_for(connection_id);
        let conn = connection_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match feed.next().await {
                    Some(Ok(event)) => {
                        // No subscribers is not an error for the host
                        let _ = channel.send(RawEvent::new(
                            scoped_event_name(&conn, &event.name),
                            event.data,
                        ));
                    }
                    Some(Err(TransportError::Closed)) | None => {
                        let _ = channel.send(RawEvent::new(
                            scoped_event_name(&conn, CLOSED_EVENT),
                            String::new(),
                        ));
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = channel.send(RawEvent::new(
                            scoped_event_name(&conn, CLOSED_EVENT),
                            e.to_string(),
                        ));
                        break;
                    }
                }
            }
        });

        let previous = self
            .state
            .streams
            .lock()
            .insert(connection_id.clone(), HostStream { id, task });
        if let Some(previous) = previous {
            previous.task.abort();
        }
        tracing::debug!(%connection_id, stream = id.0, "host stream started");
        Ok(id)
    }

    fn stop_stream(&self, connection_id: &ConnectionId, stream: ProxyStreamId) {
        let mut streams = self.state.streams.lock();
        if streams.get(connection_id).map(|s| s.id) == Some(stream) {
            if let Some(host_stream) = streams.remove(connection_id) {
                host_stream.task.abort();
                tracing::debug!(%connection_id, stream = stream.0, "host stream stopped");
            }
        }
    }

    fn subscribe(&self, connection_id: &ConnectionId) -> broadcast::Receiver<RawEvent> {
        self.channel_for(connection_id).subscribe()
    }
}

/// Transport that has a [`HostProxy`] dial and filters the host channel
/// down to this connection's frames.
#[derive(Clone)]
pub struct ProxiedTransport<P> {
    proxy: P,
}

impl<P: HostProxy> ProxiedTransport<P> {
    pub fn new(proxy: P) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }
}

#[async_trait]
impl<P: HostProxy> EventTransport for ProxiedTransport<P> {
    async fn open(&self, target: &StreamTarget) -> Result<EventFeed, TransportError> {
        // Subscribe before the host dials so no early frame is missed
        let mut shared = self.proxy.subscribe(&target.connection_id);
        let stream = self
            .proxy
            .start_stream(&target.connection_id, &target.url)
            .await?;

        let (tx, feed) = EventFeed::channel();
        let conn = target.connection_id.clone();
        let relay = tokio::spawn(async move {
            loop {
                let event = match shared.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Dropped frames break ordering; let the client reconnect
                        let _ = tx.send(Err(TransportError::Proxy(format!(
                            "lagged behind host channel by {} events",
                            missed
                        ))));
                        return;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(Err(TransportError::Proxy(
                            "host channel closed".to_string(),
                        )));
                        return;
                    }
                };
                let Some(name) = strip_tab_scope(&event.name, &conn) else {
                    continue;
                };
                if name == CLOSED_EVENT {
                    let error = if event.data.is_empty() {
                        TransportError::Closed
                    } else {
                        TransportError::Proxy(event.data)
                    };
                    let _ = tx.send(Err(error));
                    return;
                }
                let name = name.to_string();
                if tx.send(Ok(RawEvent::new(name, event.data))).is_err() {
                    return;
                }
            }
        });

        let proxy = self.proxy.clone();
        let conn = target.connection_id.clone();
        Ok(feed.on_drop(move || {
            relay.abort();
            proxy.stop_stream(&conn, stream);
        }))
    }

    fn kind(&self) -> &'static str {
        "proxied"
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
