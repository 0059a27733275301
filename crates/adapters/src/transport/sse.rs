// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental server-sent events parser.
//!
//! Chunks from the network may split lines (or UTF-8 sequences) anywhere, so
//! the parser buffers raw bytes and only decodes complete lines. A blank line
//! dispatches the pending frame. Unlike browsers, a frame with an `event:`
//! line but no `data:` is still dispatched, with empty data: the worker
//! sends payload-less events that way.

use sk_core::RawEvent;

/// Event name used when a frame has no `event:` line.
pub const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    name: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<RawEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry / unknown fields carry nothing we use
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawEvent> {
        if self.name.is_none() && self.data.is_empty() {
            return None;
        }
        let name = self
            .name
            .take()
            .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawEvent::new(name, data))
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
