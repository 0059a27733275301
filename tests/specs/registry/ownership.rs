//! Shared worker ownership across tabs and scheduled tasks.

use sk_adapters::FakeWorkerAdapter;
use sk_core::{Owner, SessionId};
use sk_engine::{Registry, RegistryConfig};
use std::path::Path;
use std::time::Duration;

fn registry() -> (FakeWorkerAdapter, Registry<FakeWorkerAdapter>) {
    let fake = FakeWorkerAdapter::new();
    (fake.clone(), Registry::new(fake, RegistryConfig::default()))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn two_tabs_share_one_worker_until_the_last_release() {
    let (fake, registry) = registry();
    let session = SessionId::new("s-1");
    let ws = Path::new("/tmp/project");

    let a = registry
        .ensure_session_sidecar(&session, ws, Owner::tab("tab-a"))
        .await
        .unwrap();
    let b = registry
        .ensure_session_sidecar(&session, ws, Owner::tab("tab-b"))
        .await
        .unwrap();
    assert!(a.is_new);
    assert!(!b.is_new);
    assert_eq!(a.port, b.port);
    assert_eq!(fake.spawn_count(), 1);

    assert!(!registry.release_session_sidecar(&session, &Owner::tab("tab-a")).await);
    settle().await;
    assert_eq!(registry.get_session_port(&session), Some(a.port));
    assert_eq!(fake.live_ports(), vec![a.port]);

    assert!(registry.release_session_sidecar(&session, &Owner::tab("tab-b")).await);
    settle().await;
    assert_eq!(registry.get_session_port(&session), None);
    assert!(fake.live_ports().is_empty());
    assert!(registry.sessions().await.is_empty());
}

#[tokio::test]
async fn scheduled_task_keeps_worker_after_tab_closes() {
    let (fake, registry) = registry();
    let session = SessionId::new("s-2");
    let ws = Path::new("/tmp/project");

    let lease = registry
        .ensure_session_sidecar(&session, ws, Owner::tab("tab-a"))
        .await
        .unwrap();
    registry
        .ensure_session_sidecar(&session, ws, Owner::scheduled_task("nightly"))
        .await
        .unwrap();

    let stopped = registry.release_owner_everywhere(&Owner::tab("tab-a")).await;
    assert!(stopped.is_empty());
    assert_eq!(
        registry.session_owners(&session).await,
        vec![Owner::scheduled_task("nightly")]
    );
    assert_eq!(registry.get_session_port(&session), Some(lease.port));

    registry
        .release_session_sidecar(&session, &Owner::scheduled_task("nightly"))
        .await;
    settle().await;
    assert!(fake.live_ports().is_empty());
}

#[tokio::test]
async fn pending_session_upgrade_keeps_worker_and_owners() {
    let (fake, registry) = registry();
    let pending = SessionId::new("pending-7");
    let real = SessionId::new("real-7");
    let mut upgrades = registry.upgrades();

    let lease = registry
        .ensure_session_sidecar(&pending, Path::new("/tmp/project"), Owner::tab("tab-a"))
        .await
        .unwrap();
    assert!(registry.upgrade_session_id(&pending, &real).await);

    let upgrade = upgrades.recv().await.unwrap();
    assert_eq!((upgrade.from, upgrade.to), (pending.clone(), real.clone()));
    assert_eq!(registry.get_session_port(&pending), None);
    assert_eq!(registry.get_session_port(&real), Some(lease.port));
    assert_eq!(registry.session_owners(&real).await, vec![Owner::tab("tab-a")]);

    // The tab re-acquires under the real id without a second spawn
    let again = registry
        .ensure_session_sidecar(&real, Path::new("/tmp/project"), Owner::tab("tab-a"))
        .await
        .unwrap();
    assert!(!again.is_new);
    assert_eq!(fake.spawn_count(), 1);
}

#[tokio::test]
async fn shutdown_stops_every_worker() {
    let (fake, registry) = registry();
    for (session, tab) in [("s-a", "tab-a"), ("s-b", "tab-b"), ("s-c", "tab-c")] {
        registry
            .ensure_session_sidecar(&SessionId::new(session), Path::new("/tmp/project"), Owner::tab(tab))
            .await
            .unwrap();
    }
    assert_eq!(fake.live_ports().len(), 3);

    registry.shutdown_all().await;

    assert!(fake.live_ports().is_empty());
    assert!(registry.sessions().await.is_empty());
}
