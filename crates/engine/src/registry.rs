// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session ownership registry.
//!
//! Keeps one worker process per session alive for exactly as long as the
//! session has at least one owner. Every operation on a session runs under
//! that session's slot lock, so check-then-spawn cannot race; operations on
//! different sessions proceed in parallel.

use crate::error::RegistryError;
use parking_lot::Mutex;
use sk_adapters::{WorkerAdapter, WorkerHandle, WorkerSpawnConfig};
use sk_core::{Owner, OwnerType, SessionId};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

const UPGRADE_CHANNEL_CAPACITY: usize = 64;

/// Registry tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How often a background completion watcher probes the worker.
    pub completion_poll_interval: Duration,
    /// Release a background completion owner after this long regardless.
    pub completion_max_duration: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            completion_poll_interval: Duration::from_secs(1),
            completion_max_duration: Duration::from_secs(30 * 60),
        }
    }
}

/// Result of acquiring a session's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidecarLease {
    pub port: u16,
    /// Whether this call started the worker.
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundCompletionStart {
    pub started: bool,
}

/// A session id was renamed in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpgrade {
    pub from: SessionId,
    pub to: SessionId,
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub port: Option<u16>,
    pub workspace_path: Option<PathBuf>,
    pub owners: Vec<Owner>,
    pub watching_completion: bool,
}

struct Watcher {
    id: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    /// Set once the slot is removed from the map; waiters must look again.
    retired: bool,
    handle: Option<WorkerHandle>,
    owners: BTreeSet<Owner>,
    watcher: Option<Watcher>,
}

type SlotGuard = OwnedMutexGuard<Slot>;

/// Lookup state readable without any slot lock.
#[derive(Default)]
struct Directory {
    /// Ports of live handles.
    ports: HashMap<SessionId, u16>,
    /// Upgraded id -> the id it was renamed to.
    aliases: HashMap<SessionId, SessionId>,
}

impl Directory {
    /// Follow the alias chain from `session_id` to its current id.
    fn current(&self, session_id: &SessionId) -> SessionId {
        let mut current = session_id;
        // An upgrade target never aliases onward, so chains end; bound the walk anyway
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// The id now serving a live worker of `session_id` is no longer an alias.
    fn activate(&mut self, session_id: &SessionId, port: u16) {
        self.aliases.remove(session_id);
        self.ports.insert(session_id.clone(), port);
    }

    /// Forget a stopped session and every alias leading to it.
    fn remove(&mut self, session_id: &SessionId) {
        self.ports.remove(session_id);
        self.aliases.retain(|_, to| to != session_id);
    }
}

struct RegistryInner<W> {
    adapter: W,
    config: RegistryConfig,
    slots: Mutex<HashMap<SessionId, Arc<AsyncMutex<Slot>>>>,
    directory: Mutex<Directory>,
    /// Background completion watcher id -> session it currently watches.
    watches: Mutex<HashMap<u64, SessionId>>,
    next_watch: AtomicU64,
    upgrades: broadcast::Sender<SessionUpgrade>,
}

/// Ownership registry for per-session worker processes
pub struct Registry<W> {
    inner: Arc<RegistryInner<W>>,
}

impl<W> Clone for Registry<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: WorkerAdapter> Registry<W> {
    pub fn new(adapter: W, config: RegistryConfig) -> Self {
        let (upgrades, _) = broadcast::channel(UPGRADE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                adapter,
                config,
                slots: Mutex::new(HashMap::new()),
                directory: Mutex::new(Directory::default()),
                watches: Mutex::new(HashMap::new()),
                next_watch: AtomicU64::new(1),
                upgrades,
            }),
        }
    }

    pub fn adapter(&self) -> &W {
        &self.inner.adapter
    }

    /// Lock an existing session's slot.
    ///
    /// Loops when the acquired slot was retired while we waited for it.
    async fn lock_slot(&self, session_id: &SessionId) -> Option<SlotGuard> {
        loop {
            let slot = self.inner.slots.lock().get(session_id).cloned()?;
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return Some(guard);
            }
        }
    }

    /// Lock a session's slot, creating an empty one if none exists.
    async fn lock_or_create_slot(&self, session_id: &SessionId) -> SlotGuard {
        loop {
            let slot = Arc::clone(
                self.inner
                    .slots
                    .lock()
                    .entry(session_id.clone())
                    .or_default(),
            );
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return guard;
            }
        }
    }

    /// Remove a locked slot from the map and mark it retired.
    fn retire(&self, session_id: &SessionId, slot: &mut SlotGuard) {
        slot.retired = true;
        let mut slots = self.inner.slots.lock();
        if slots
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, OwnedMutexGuard::mutex(slot)))
        {
            slots.remove(session_id);
        }
    }

    /// Clear a session entirely: owners, watcher, port, slot.
    /// Returns the handle so the caller can terminate it.
    fn teardown(&self, session_id: &SessionId, slot: &mut SlotGuard) -> Option<WorkerHandle> {
        slot.owners.clear();
        if let Some(watcher) = slot.watcher.take() {
            watcher.task.abort();
            self.inner.watches.lock().remove(&watcher.id);
        }
        self.inner.directory.lock().remove(session_id);
        let handle = slot.handle.take();
        self.retire(session_id, slot);
        handle
    }

    /// Kill a worker on a background task; failures are logged only.
    fn terminate_in_background(&self, session_id: &SessionId, handle: WorkerHandle) {
        let adapter = self.inner.adapter.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.kill(&handle).await {
                tracing::warn!(%session_id, port = handle.port, error = %e, "worker termination failed");
            }
        });
    }

    /// Acquire a session's worker for `owner`, starting it if needed.
    pub async fn ensure_session_sidecar(
        &self,
        session_id: &SessionId,
        workspace_path: &Path,
        owner: Owner,
    ) -> Result<SidecarLease, RegistryError> {
        let mut slot = self.lock_or_create_slot(session_id).await;

        if let Some(handle) = slot.handle.clone() {
            match self.inner.adapter.is_alive(&handle).await {
                Ok(true) => {
                    let added = slot.owners.insert(owner.clone());
                    tracing::debug!(%session_id, %owner, added, port = handle.port, "joined running worker");
                    return Ok(SidecarLease {
                        port: handle.port,
                        is_new: false,
                    });
                }
                Ok(false) => {
                    tracing::warn!(%session_id, port = handle.port, "worker died, restarting");
                }
                Err(e) => {
                    tracing::warn!(%session_id, port = handle.port, error = %e, "liveness probe failed, restarting");
                }
            }
            slot.handle = None;
            self.inner.directory.lock().ports.remove(session_id);
            self.terminate_in_background(session_id, handle);
        }

        let spawned = self
            .inner
            .adapter
            .spawn(WorkerSpawnConfig {
                session_id: session_id.clone(),
                workspace_path: workspace_path.to_path_buf(),
            })
            .await;
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if slot.owners.is_empty() {
                    self.retire(session_id, &mut slot);
                }
                return Err(e.into());
            }
        };

        let port = handle.port;
        self.inner.directory.lock().activate(session_id, port);
        slot.handle = Some(handle);
        slot.owners.insert(owner.clone());
        tracing::info!(%session_id, %owner, port, "worker started");
        Ok(SidecarLease { port, is_new: true })
    }

    /// Drop `owner` from a session. Returns true if this emptied the owner
    /// set and the worker is being stopped. Unknown session or owner is a no-op.
    pub async fn release_session_sidecar(&self, session_id: &SessionId, owner: &Owner) -> bool {
        let Some(mut slot) = self.lock_slot(session_id).await else {
            return false;
        };
        if !slot.owners.remove(owner) {
            return false;
        }
        if owner.kind == OwnerType::BackgroundCompletion {
            if let Some(watcher) = slot.watcher.take() {
                watcher.task.abort();
                self.inner.watches.lock().remove(&watcher.id);
            }
        }
        if !slot.owners.is_empty() {
            tracing::debug!(%session_id, %owner, remaining = slot.owners.len(), "owner released");
            return false;
        }

        let handle = self.teardown(session_id, &mut slot);
        drop(slot);
        tracing::info!(%session_id, %owner, "last owner released, stopping worker");
        if let Some(handle) = handle {
            self.terminate_in_background(session_id, handle);
        }
        true
    }

    /// Port of the session's worker, if one is running. Never blocks.
    pub fn get_session_port(&self, session_id: &SessionId) -> Option<u16> {
        self.inner.directory.lock().ports.get(session_id).copied()
    }

    /// Follow upgrades from `session_id` to its current id, and return that
    /// id with its worker's port. A renamed id resolves to its new name as
    /// soon as `upgrade_session_id` returns.
    pub fn resolve_session(&self, session_id: &SessionId) -> (SessionId, Option<u16>) {
        let directory = self.inner.directory.lock();
        let current = directory.current(session_id);
        let port = directory.ports.get(&current).copied();
        (current, port)
    }

    /// Move a session's worker, owners and watcher from `old` to `new`.
    ///
    /// Refused when `old` is unknown, `old == new`, or `new` is in use.
    pub async fn upgrade_session_id(&self, old: &SessionId, new: &SessionId) -> bool {
        if old == new {
            return false;
        }

        // Lock both slots in id order
        let (mut old_slot, mut new_slot) = if old < new {
            let Some(old_slot) = self.lock_slot(old).await else {
                return false;
            };
            let new_slot = self.lock_or_create_slot(new).await;
            (old_slot, new_slot)
        } else {
            let mut new_slot = self.lock_or_create_slot(new).await;
            let Some(old_slot) = self.lock_slot(old).await else {
                self.retire_if_empty(new, &mut new_slot);
                return false;
            };
            (old_slot, new_slot)
        };

        if new_slot.handle.is_some() || !new_slot.owners.is_empty() {
            tracing::warn!(from = %old, to = %new, "upgrade refused, target session in use");
            return false;
        }
        if old_slot.handle.is_none() && old_slot.owners.is_empty() {
            self.retire_if_empty(new, &mut new_slot);
            return false;
        }

        let old_completion = Owner::background_completion(old);
        new_slot.owners = std::mem::take(&mut old_slot.owners)
            .into_iter()
            .map(|owner| {
                if owner == old_completion {
                    Owner::background_completion(new)
                } else {
                    owner
                }
            })
            .collect();
        new_slot.handle = old_slot.handle.take();
        new_slot.watcher = old_slot.watcher.take();
        if let Some(watcher) = &new_slot.watcher {
            self.inner.watches.lock().insert(watcher.id, new.clone());
        }
        {
            // Port move and alias land together so lookups never see a gap
            let mut directory = self.inner.directory.lock();
            directory.ports.remove(old);
            directory.aliases.remove(new);
            directory.aliases.insert(old.clone(), new.clone());
            if let Some(handle) = &new_slot.handle {
                directory.ports.insert(new.clone(), handle.port);
            }
        }
        self.retire(old, &mut old_slot);
        drop(old_slot);
        drop(new_slot);

        tracing::info!(from = %old, to = %new, "session id upgraded");
        // No subscribers is fine
        let _ = self.inner.upgrades.send(SessionUpgrade {
            from: old.clone(),
            to: new.clone(),
        });
        true
    }

    fn retire_if_empty(&self, session_id: &SessionId, slot: &mut SlotGuard) {
        if slot.handle.is_none() && slot.owners.is_empty() && slot.watcher.is_none() {
            self.retire(session_id, slot);
        }
    }

    /// Keep the worker alive until its in-flight response finishes.
    pub async fn start_background_completion(
        &self,
        session_id: &SessionId,
    ) -> BackgroundCompletionStart {
        let not_started = BackgroundCompletionStart { started: false };
        let Some(mut slot) = self.lock_slot(session_id).await else {
            return not_started;
        };
        if slot.watcher.is_some() {
            return BackgroundCompletionStart { started: true };
        }
        let Some(handle) = slot.handle.clone() else {
            return not_started;
        };
        match self.inner.adapter.is_busy(&handle).await {
            Ok(true) => {}
            Ok(false) => return not_started,
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "busy probe failed, not watching");
                return not_started;
            }
        }

        slot.owners.insert(Owner::background_completion(session_id));
        let id = self.inner.next_watch.fetch_add(1, Ordering::Relaxed);
        self.inner.watches.lock().insert(id, session_id.clone());
        let task = tokio::spawn(self.clone().watch_completion(id));
        slot.watcher = Some(Watcher { id, task });
        tracing::info!(%session_id, watch = id, "watching background completion");
        BackgroundCompletionStart { started: true }
    }

    /// Stop watching a background completion and drop its owner.
    /// Returns whether one was present.
    pub async fn cancel_background_completion(&self, session_id: &SessionId) -> bool {
        let Some(mut slot) = self.lock_slot(session_id).await else {
            return false;
        };
        let had_watcher = match slot.watcher.take() {
            Some(watcher) => {
                watcher.task.abort();
                self.inner.watches.lock().remove(&watcher.id);
                true
            }
            None => false,
        };
        let had_owner = slot
            .owners
            .remove(&Owner::background_completion(session_id));
        if !(had_watcher || had_owner) {
            return false;
        }
        if slot.owners.is_empty() {
            let handle = self.teardown(session_id, &mut slot);
            drop(slot);
            if let Some(handle) = handle {
                self.terminate_in_background(session_id, handle);
            }
        }
        tracing::info!(%session_id, "background completion cancelled");
        true
    }

    /// Lock the slot a watcher currently belongs to, following upgrades.
    async fn lock_watched_slot(&self, watch_id: u64) -> Option<(SessionId, SlotGuard)> {
        loop {
            let session_id = self.inner.watches.lock().get(&watch_id).cloned()?;
            let slot = self.lock_slot(&session_id).await;
            let current = self.inner.watches.lock().get(&watch_id).cloned();
            match (slot, current) {
                (Some(slot), Some(current)) if current == session_id => {
                    if slot.watcher.as_ref().map(|w| w.id) != Some(watch_id) {
                        return None;
                    }
                    return Some((session_id, slot));
                }
                (None, Some(current)) if current == session_id => {
                    self.inner.watches.lock().remove(&watch_id);
                    return None;
                }
                (_, None) => return None,
                // Re-keyed by an upgrade while we waited
                _ => continue,
            }
        }
    }

    async fn watch_completion(self, watch_id: u64) {
        let started = tokio::time::Instant::now();
        let poll = self.inner.config.completion_poll_interval;
        let max_duration = self.inner.config.completion_max_duration;
        loop {
            tokio::time::sleep(poll).await;

            let handle = match self.lock_watched_slot(watch_id).await {
                Some((_, slot)) => slot.handle.clone(),
                None => return,
            };
            let idle = match &handle {
                None => true,
                Some(handle) => match self.inner.adapter.is_busy(handle).await {
                    Ok(busy) => !busy,
                    Err(e) => {
                        tracing::debug!(watch = watch_id, error = %e, "busy probe failed, treating as idle");
                        true
                    }
                },
            };
            let expired = started.elapsed() >= max_duration;
            if idle || expired {
                if !idle {
                    tracing::warn!(
                        watch = watch_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "background completion still busy, giving up"
                    );
                }
                self.finish_completion(watch_id).await;
                return;
            }
        }
    }

    async fn finish_completion(&self, watch_id: u64) {
        let Some((session_id, mut slot)) = self.lock_watched_slot(watch_id).await else {
            return;
        };
        // Detach rather than abort: this runs on the watcher task itself
        slot.watcher = None;
        self.inner.watches.lock().remove(&watch_id);
        slot.owners.remove(&Owner::background_completion(&session_id));
        tracing::info!(%session_id, "background completion finished");
        if slot.owners.is_empty() {
            let handle = self.teardown(&session_id, &mut slot);
            drop(slot);
            if let Some(handle) = handle {
                self.terminate_in_background(&session_id, handle);
            }
        }
    }

    /// Owners currently holding a session (sorted).
    pub async fn session_owners(&self, session_id: &SessionId) -> Vec<Owner> {
        match self.lock_slot(session_id).await {
            Some(slot) => slot.owners.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of every known session, sorted by id.
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        let mut ids: Vec<SessionId> = self.inner.slots.lock().keys().cloned().collect();
        ids.sort();
        let mut snapshots = Vec::with_capacity(ids.len());
        for session_id in ids {
            let Some(slot) = self.lock_slot(&session_id).await else {
                continue;
            };
            snapshots.push(SessionSnapshot {
                port: slot.handle.as_ref().map(|h| h.port),
                workspace_path: slot.handle.as_ref().map(|h| h.workspace_path.clone()),
                owners: slot.owners.iter().cloned().collect(),
                watching_completion: slot.watcher.is_some(),
                session_id,
            });
        }
        snapshots
    }

    /// Release `owner` from every session holding it. Returns the sessions
    /// whose worker was stopped as a result.
    pub async fn release_owner_everywhere(&self, owner: &Owner) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.inner.slots.lock().keys().cloned().collect();
        ids.sort();
        let mut stopped = Vec::new();
        for session_id in ids {
            if self.release_session_sidecar(&session_id, owner).await {
                stopped.push(session_id);
            }
        }
        stopped
    }

    /// Tear down every session and wait for every worker to exit.
    pub async fn shutdown_all(&self) {
        let slots: Vec<(SessionId, Arc<AsyncMutex<Slot>>)> =
            self.inner.slots.lock().drain().collect();
        let mut handles = Vec::new();
        for (session_id, slot) in slots {
            let mut slot = slot.lock_owned().await;
            slot.retired = true;
            slot.owners.clear();
            if let Some(watcher) = slot.watcher.take() {
                watcher.task.abort();
            }
            if let Some(handle) = slot.handle.take() {
                handles.push((session_id, handle));
            }
        }
        *self.inner.directory.lock() = Directory::default();
        self.inner.watches.lock().clear();

        tracing::info!(workers = handles.len(), "shutting down all workers");
        for (session_id, handle) in handles {
            if let Err(e) = self.inner.adapter.kill(&handle).await {
                tracing::warn!(%session_id, port = handle.port, error = %e, "worker termination failed");
            }
        }
    }

    /// Subscribe to session id upgrades.
    pub fn upgrades(&self) -> broadcast::Receiver<SessionUpgrade> {
        self.inner.upgrades.subscribe()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
