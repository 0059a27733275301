//! Workers outlive their tabs while a response is still being produced.

use sk_adapters::FakeWorkerAdapter;
use sk_core::{Owner, SessionId};
use sk_engine::{Registry, RegistryConfig};
use std::path::Path;
use std::time::Duration;

fn registry() -> (FakeWorkerAdapter, Registry<FakeWorkerAdapter>) {
    let fake = FakeWorkerAdapter::new();
    let config = RegistryConfig {
        completion_poll_interval: Duration::from_millis(500),
        completion_max_duration: Duration::from_secs(60),
    };
    (fake.clone(), Registry::new(fake, config))
}

#[tokio::test(start_paused = true)]
async fn closing_a_busy_tab_defers_termination_until_idle() {
    let (fake, registry) = registry();
    let session = SessionId::new("s-1");
    let lease = registry
        .ensure_session_sidecar(&session, Path::new("/tmp/project"), Owner::tab("tab-a"))
        .await
        .unwrap();
    fake.set_busy(lease.port, true);

    let start = registry.start_background_completion(&session).await;
    assert!(start.started);
    assert!(!registry.release_session_sidecar(&session, &Owner::tab("tab-a")).await);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fake.live_ports(), vec![lease.port]);
    assert_eq!(
        registry.session_owners(&session).await,
        vec![Owner::background_completion(&session)]
    );

    fake.set_busy(lease.port, false);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fake.live_ports().is_empty());
    assert_eq!(registry.get_session_port(&session), None);
}

#[tokio::test(start_paused = true)]
async fn completion_gives_up_after_the_time_limit() {
    let (fake, registry) = registry();
    let session = SessionId::new("s-2");
    let lease = registry
        .ensure_session_sidecar(&session, Path::new("/tmp/project"), Owner::tab("tab-a"))
        .await
        .unwrap();
    fake.set_busy(lease.port, true);

    assert!(registry.start_background_completion(&session).await.started);
    registry
        .release_session_sidecar(&session, &Owner::tab("tab-a"))
        .await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(fake.live_ports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_worker_is_not_watched() {
    let (fake, registry) = registry();
    let session = SessionId::new("s-3");
    registry
        .ensure_session_sidecar(&session, Path::new("/tmp/project"), Owner::tab("tab-a"))
        .await
        .unwrap();

    assert!(!registry.start_background_completion(&session).await.started);
    assert!(registry.release_session_sidecar(&session, &Owner::tab("tab-a")).await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(fake.live_ports().is_empty());
}
