// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker event taxonomy and payload decoding.
//!
//! Every event the worker emits on its stream carries a name and a text
//! payload. The name alone decides how the payload is decoded; the table in
//! [`classify`] must stay in sync with what the worker emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame received from a transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    pub data: String,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// How an event's payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Must be JSON. Malformed payloads degrade to `null`.
    Json,
    /// JSON if it parses, otherwise the raw string (legacy plain-text producers).
    JsonOrString,
    /// Passed through verbatim.
    PlainString,
    /// Payload ignored, always `null`.
    NullPayload,
}

/// Classify an event name, or `None` if the name is not in the taxonomy.
pub fn classify(name: &str) -> Option<PayloadKind> {
    let kind = match name {
        "chat:init"
        | "chat:status"
        | "chat:system-init"
        | "chat:message-replay"
        | "chat:tool-use-start"
        | "chat:tool-input-delta-json"
        | "chat:tool-result-start"
        | "chat:tool-result-complete"
        | "chat:content-block-stop"
        | "chat:subagent-tool-use"
        | "chat:subagent-tool-result"
        | "chat:permission-request"
        | "chat:ask-user-question"
        | "chat:queue-added"
        | "chat:queue-started"
        | "chat:usage"
        | "chat:logs" => PayloadKind::Json,

        "chat:log" | "chat:message-error" | "chat:agent-error" => PayloadKind::JsonOrString,

        "chat:message-chunk"
        | "chat:thinking-delta"
        | "chat:tool-input-delta"
        | "chat:debug-message" => PayloadKind::PlainString,

        "chat:message-complete"
        | "chat:message-stopped"
        | "chat:thinking-start"
        | "chat:heartbeat" => PayloadKind::NullPayload,

        _ => return None,
    };
    Some(kind)
}

/// Outcome of decoding one raw event.
#[derive(Debug)]
pub enum Decoded {
    /// Deliver this payload to the handler.
    Payload(Value),
    /// A JSON event whose payload failed to parse. Delivered as `null`.
    Malformed(serde_json::Error),
    /// Name not in the taxonomy. Dropped.
    Unrecognized,
}

impl Decoded {
    /// The value to hand to the event handler, if the event is delivered at all.
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Decoded::Payload(value) => Some(value),
            Decoded::Malformed(_) => Some(Value::Null),
            Decoded::Unrecognized => None,
        }
    }
}

/// Decode a raw event according to its name's payload kind.
pub fn decode(event: &RawEvent) -> Decoded {
    let Some(kind) = classify(&event.name) else {
        return Decoded::Unrecognized;
    };
    match kind {
        PayloadKind::Json => match serde_json::from_str(&event.data) {
            Ok(value) => Decoded::Payload(value),
            Err(e) => Decoded::Malformed(e),
        },
        PayloadKind::JsonOrString => Decoded::Payload(
            serde_json::from_str(&event.data).unwrap_or_else(|_| Value::String(event.data.clone())),
        ),
        PayloadKind::PlainString => Decoded::Payload(Value::String(event.data.clone())),
        PayloadKind::NullPayload => Decoded::Payload(Value::Null),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
