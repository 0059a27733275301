//! Test helpers for behavioral specifications.
//!
//! Provides a scriptable local SSE server and polling helpers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use sk_core::{Backoff, ConnectionStatus};
use sk_engine::StreamConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 2000;

/// Stream settings with short retry delays for real-clock tests.
pub fn fast_stream_config() -> StreamConfig {
    StreamConfig {
        backoff: Backoff::new(Duration::from_millis(50), Duration::from_millis(200), 3),
        ..StreamConfig::default()
    }
}

/// Poll `condition` until it holds or the spec wait budget runs out.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
}

/// Collected `(event, payload)` pairs
pub type Events = Arc<Mutex<Vec<(String, Value)>>>;
/// Collected status notifications
pub type Statuses = Arc<Mutex<Vec<ConnectionStatus>>>;

enum Frame {
    Data(String),
    Close,
}

/// Local SSE endpoint. Every accepted request becomes a connection that
/// tests can write frames to or close.
pub struct SseServer {
    port: u16,
    conns: Arc<Mutex<Vec<mpsc::UnboundedSender<Frame>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl SseServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let conns: Arc<Mutex<Vec<mpsc::UnboundedSender<Frame>>>> = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let accepted = Arc::clone(&conns);
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 2048];
                let n = socket.read(&mut request).await.unwrap_or(0);
                let request_line = String::from_utf8_lossy(&request[..n])
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                seen.lock().push(request_line);

                let (tx, mut rx) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";
                    if socket.write_all(head.as_bytes()).await.is_err() {
                        return;
                    }
                    while let Some(Frame::Data(frame)) = rx.recv().await {
                        if socket.write_all(frame.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    let _ = socket.shutdown().await;
                });
                accepted.lock().push(tx);
            }
        });

        Self {
            port,
            conns,
            requests,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of stream requests accepted so far
    pub fn connections(&self) -> usize {
        self.conns.lock().len()
    }

    /// Request lines received, e.g. `GET /chat/stream HTTP/1.1`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Write one event to the most recent connection.
    pub fn send(&self, name: &str, data: &str) -> bool {
        match self.conns.lock().last() {
            Some(tx) => tx
                .send(Frame::Data(format!("event: {}\ndata: {}\n\n", name, data)))
                .is_ok(),
            None => false,
        }
    }

    /// End the most recent connection's response body.
    pub fn close_latest(&self) {
        if let Some(tx) = self.conns.lock().last() {
            let _ = tx.send(Frame::Close);
        }
    }
}
