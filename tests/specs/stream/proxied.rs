//! Proxied streams share one host channel but stay isolated per tab.

use crate::prelude::*;
use serde_json::json;
use sk_adapters::{InProcessHostProxy, ProxiedTransport};
use sk_core::ConnectionId;
use sk_engine::EventStreamClient;
use std::sync::Arc;

type Client = EventStreamClient<ProxiedTransport<InProcessHostProxy>>;

fn client(proxy: &InProcessHostProxy, server: &SseServer, tab: &str) -> (Client, Events) {
    let client = EventStreamClient::builder(ConnectionId::new(tab), ProxiedTransport::new(proxy.clone()))
        .config(fast_stream_config())
        .legacy_port(server.port())
        .build();
    let events = Events::default();
    let sink = Arc::clone(&events);
    client.set_event_handler(move |name, value| sink.lock().push((name.to_string(), value)));
    (client, events)
}

#[tokio::test]
async fn tabs_only_see_their_own_events() {
    let proxy = InProcessHostProxy::default();
    let server_a = SseServer::start().await;
    let server_b = SseServer::start().await;
    let (a, events_a) = client(&proxy, &server_a, "tab-a");
    let (b, events_b) = client(&proxy, &server_b, "tab-b");

    a.connect().await.unwrap();
    b.connect().await.unwrap();
    assert!(wait_for(|| server_a.connections() == 1 && server_b.connections() == 1).await);
    assert_eq!(proxy.active_streams(), 2);

    server_a.send("chat:init", r#"{"tab":"a"}"#);
    server_b.send("chat:init", r#"{"tab":"b"}"#);
    server_b.send("chat:message-chunk", "only b");
    assert!(wait_for(|| events_a.lock().len() == 1 && events_b.lock().len() == 2).await);

    assert_eq!(
        *events_a.lock(),
        vec![("chat:init".to_string(), json!({"tab": "a"}))]
    );
    assert_eq!(
        *events_b.lock(),
        vec![
            ("chat:init".to_string(), json!({"tab": "b"})),
            ("chat:message-chunk".to_string(), json!("only b")),
        ]
    );

    a.disconnect();
    assert!(wait_for(|| proxy.active_streams() == 1).await);
    b.disconnect();
    assert!(wait_for(|| proxy.active_streams() == 0).await);
}

#[tokio::test]
async fn host_side_close_triggers_client_reconnect() {
    let proxy = InProcessHostProxy::default();
    let server = SseServer::start().await;
    let (client, events) = client(&proxy, &server, "tab-a");
    client.connect().await.unwrap();
    assert!(wait_for(|| server.connections() == 1).await);

    server.close_latest();
    assert!(wait_for(|| server.connections() == 2).await);
    assert!(wait_for(|| client.is_connected()).await);

    server.send("chat:usage", r#"{"tokens":3}"#);
    assert!(wait_for(|| events.lock().len() == 1).await);
    assert_eq!(proxy.active_streams(), 1);
    client.disconnect();
}
