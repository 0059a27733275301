// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spawn_config(session: &str) -> WorkerSpawnConfig {
    WorkerSpawnConfig {
        session_id: SessionId::new(session),
        workspace_path: PathBuf::from("/tmp/ws"),
    }
}

#[tokio::test]
async fn fake_worker_spawn_assigns_sequential_ports() {
    let adapter = FakeWorkerAdapter::new();
    let a = adapter.spawn(spawn_config("a")).await.unwrap();
    let b = adapter.spawn(spawn_config("b")).await.unwrap();

    assert_eq!(a.port, FIRST_PORT);
    assert_eq!(b.port, FIRST_PORT + 1);
    assert_eq!(adapter.live_ports(), vec![a.port, b.port]);
    assert_eq!(adapter.spawn_count(), 2);
}

#[tokio::test]
async fn fake_worker_kill_marks_dead() {
    let adapter = FakeWorkerAdapter::new();
    let handle = adapter.spawn(spawn_config("a")).await.unwrap();

    assert!(adapter.is_alive(&handle).await.unwrap());
    adapter.kill(&handle).await.unwrap();
    assert!(!adapter.is_alive(&handle).await.unwrap());
    assert!(adapter.live_ports().is_empty());
    assert_eq!(adapter.kill_count(), 1);
}

#[tokio::test]
async fn fake_worker_spawn_error_records_call() {
    let adapter = FakeWorkerAdapter::new();
    adapter.set_spawn_error(Some("boom"));

    let result = adapter.spawn(spawn_config("a")).await;
    assert!(matches!(result, Err(WorkerError::SpawnFailed(ref m)) if m == "boom"));
    assert_eq!(adapter.spawn_count(), 1);
    assert!(adapter.live_ports().is_empty());
}

#[tokio::test]
async fn fake_worker_kill_error_still_kills() {
    let adapter = FakeWorkerAdapter::new();
    let handle = adapter.spawn(spawn_config("a")).await.unwrap();
    adapter.set_kill_error(Some("stuck"));

    assert!(adapter.kill(&handle).await.is_err());
    assert!(!adapter.get_worker(handle.port).unwrap().alive);
}

#[tokio::test]
async fn fake_worker_busy_probe() {
    let adapter = FakeWorkerAdapter::new();
    let handle = adapter.spawn(spawn_config("a")).await.unwrap();

    assert!(!adapter.is_busy(&handle).await.unwrap());
    adapter.set_busy(handle.port, true);
    assert!(adapter.is_busy(&handle).await.unwrap());

    adapter.set_dead(handle.port);
    assert!(adapter.is_busy(&handle).await.is_err());
}
