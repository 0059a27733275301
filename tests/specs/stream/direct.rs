//! Direct SSE streams against a live endpoint.

use crate::prelude::*;
use serde_json::{json, Value};
use sk_adapters::DirectSseTransport;
use sk_core::{ConnectionId, ConnectionState, ConnectionStatus};
use sk_engine::EventStreamClient;
use std::sync::Arc;

fn client(server: &SseServer, tab: &str) -> (EventStreamClient<DirectSseTransport>, Events, Statuses) {
    let client = EventStreamClient::builder(ConnectionId::new(tab), DirectSseTransport::new())
        .config(fast_stream_config())
        .legacy_port(server.port())
        .build();
    let events = Events::default();
    let statuses = Statuses::default();
    let sink = Arc::clone(&events);
    client.set_event_handler(move |name, value| sink.lock().push((name.to_string(), value)));
    let sink = Arc::clone(&statuses);
    client.set_status_handler(move |status| sink.lock().push(status));
    (client, events, statuses)
}

#[tokio::test]
async fn events_arrive_typed_and_in_order() {
    let server = SseServer::start().await;
    let (client, events, _) = client(&server, "tab-a");

    client.connect().await.unwrap();
    assert!(wait_for(|| server.connections() == 1).await);
    assert_eq!(server.requests()[0], "GET /chat/stream HTTP/1.1");

    server.send("chat:init", r#"{"model":"m1"}"#);
    server.send("chat:message-chunk", "Hel");
    server.send("chat:message-chunk", "lo");
    server.send("chat:not-a-thing", "{}");
    server.send("chat:message-complete", "");
    assert!(wait_for(|| events.lock().len() == 4).await);

    assert_eq!(
        *events.lock(),
        vec![
            ("chat:init".to_string(), json!({"model": "m1"})),
            ("chat:message-chunk".to_string(), json!("Hel")),
            ("chat:message-chunk".to_string(), json!("lo")),
            ("chat:message-complete".to_string(), Value::Null),
        ]
    );
    client.disconnect();
}

#[tokio::test]
async fn closed_stream_reconnects_and_resumes() {
    let server = SseServer::start().await;
    let (client, events, statuses) = client(&server, "tab-a");
    client.connect().await.unwrap();
    assert!(wait_for(|| server.connections() == 1).await);

    server.close_latest();
    assert!(wait_for(|| server.connections() == 2).await);
    assert!(wait_for(|| client.is_connected()).await);
    assert_eq!(client.reconnect_attempts(), 0);

    server.send("chat:status", r#"{"state":"idle"}"#);
    assert!(wait_for(|| events.lock().len() == 1).await);
    assert!(wait_for(|| statuses.lock().len() == 3).await);
    assert_eq!(
        *statuses.lock(),
        vec![
            ConnectionStatus::Connected,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Connected,
        ]
    );
    client.disconnect();
}

#[tokio::test]
async fn unreachable_endpoint_fails_after_retries() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = EventStreamClient::builder(ConnectionId::new("tab-x"), DirectSseTransport::new())
        .config(fast_stream_config())
        .legacy_port(port)
        .build();

    assert!(client.connect().await.is_err());
    assert!(wait_for(|| client.state() == ConnectionState::Failed).await);
    assert_eq!(client.reconnect_attempts(), 3);
}

#[tokio::test]
async fn disconnect_closes_the_http_stream() {
    let server = SseServer::start().await;
    let (client, events, _) = client(&server, "tab-a");
    client.connect().await.unwrap();
    assert!(wait_for(|| server.connections() == 1).await);

    client.disconnect();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    server.send("chat:init", "{}");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(events.lock().is_empty());
    assert_eq!(server.connections(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
