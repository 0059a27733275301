// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side SSE transport: the connection dials the worker itself

use super::sse::SseParser;
use super::{EventFeed, EventTransport, FeedSender, StreamTarget, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Dials `GET <url>` with `Accept: text/event-stream` and parses frames on a
/// dedicated reader task. One stream per connection, so no filtering.
#[derive(Clone)]
pub struct DirectSseTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl Default for DirectSseTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectSseTransport {
    pub fn new() -> Self {
        Self::with_connect_timeout(crate::env::connect_timeout_ms())
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl EventTransport for DirectSseTransport {
    async fn open(&self, target: &StreamTarget) -> Result<EventFeed, TransportError> {
        let request = self
            .client
            .get(target.url.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let response = match tokio::time::timeout(self.connect_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            Err(_) => {
                return Err(TransportError::Connect(format!(
                    "no response from {} after {}ms",
                    target.url,
                    self.connect_timeout.as_millis()
                )))
            }
        };
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let (tx, feed) = EventFeed::channel();
        let relay = tokio::spawn(relay_frames(response, tx));
        tracing::debug!(connection_id = %target.connection_id, url = %target.url, "sse stream open");
        Ok(feed.on_drop(move || relay.abort()))
    }

    fn kind(&self) -> &'static str {
        "direct"
    }
}

/// Read the response body, forwarding parsed frames until the stream ends,
/// fails, or the feed is dropped.
async fn relay_frames(response: reqwest::Response, tx: FeedSender) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(TransportError::Stream(e.to_string())));
                return;
            }
        };
        for event in parser.feed(&chunk) {
            if tx.send(Ok(event)).is_err() {
                return;
            }
        }
    }
    let _ = tx.send(Err(TransportError::Closed));
}

#[cfg(test)]
#[path = "direct_tests.rs"]
mod tests;
