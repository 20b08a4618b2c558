//! Authoritative download queue and its reconciliation with the daemon.
//!
//! # Overview
//!
//! [`QueueOrchestrator`] owns the id-keyed map of [`DownloadRecord`]s. User
//! actions mutate it immediately (optimistically, where the transition is
//! legal), a periodic [`QueueOrchestrator::poll`] merges the daemon's view back
//! in, and every change is coalesced through a dirty flag into a single
//! persist-and-notify flush.
//!
//! - [`DownloadBackend`] - the daemon seam
//! - [`Action`] - plain messages presentation layers send
//! - [`ObserverRegistry`] - bounded list of snapshot callbacks
//! - [`OrchestratorRuntime`] / [`OrchestratorHandle`] - the tokio control loop
//!
//! No operation here returns an error. Daemon failures are logged and absorbed,
//! and persistence failures leave the in-memory state authoritative.
//!
//! # Example
//!
//! ```no_run
//! use superdownload_core::orchestrator::QueueOrchestrator;
//! use superdownload_core::persistence::PersistenceStore;
//! use superdownload_core::rpc::{RemoteDownloadClient, RpcSettings};
//!
//! # async fn example() {
//! let store = PersistenceStore::open("/tmp/superdownload-state");
//! let (config, history) = store.load();
//! let client = RemoteDownloadClient::connect(&RpcSettings::default()).await;
//!
//! let mut orchestrator = QueueOrchestrator::new(client, store, &config, history);
//! orchestrator.enqueue(["https://example.com/file.zip"]).await;
//! let report = orchestrator.poll().await;
//! println!("{} checked, {} changed", report.checked, report.changed);
//! orchestrator.shutdown();
//! # }
//! ```

mod action;
mod backend;
mod error;
mod observer;
mod runtime;
#[cfg(test)]
mod testing;

pub use action::Action;
pub use backend::DownloadBackend;
pub use error::OrchestratorError;
pub use observer::{DEFAULT_OBSERVER_CAPACITY, ObserverCallback, ObserverId, ObserverRegistry};
pub use runtime::{OrchestratorHandle, OrchestratorRuntime};

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::persistence::{AppConfig, PersistenceStore, SnapshotStore};
use crate::record::{DownloadRecord, DownloadStatus, clamp_progress};
use crate::rpc::{DaemonOptions, RemoteDownloadClient, RemoteStatus, guess_filename};

/// Interval between reconciliation polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Smallest progress change that counts as a change.
pub const PROGRESS_EPSILON: f64 = 1e-4;

/// Consecutive failed status fetches after which an in-flight record no
/// longer holds up [`QueueOrchestrator::is_drained`].
pub const UNREPORTED_AFTER_FAILURES: u32 = 3;

/// Prefix of ids synthesized for URLs the daemon refused.
const LOCAL_ID_PREFIX: &str = "local-";

/// Outcome of one reconciliation poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Ids whose status was fetched.
    pub checked: usize,
    /// Ids whose record changed.
    pub changed: usize,
    /// Ids whose status could not be fetched.
    pub failed: usize,
}

/// The download queue state machine.
pub struct QueueOrchestrator<B = RemoteDownloadClient, S = PersistenceStore> {
    backend: B,
    store: S,
    downloads: BTreeMap<String, DownloadRecord>,
    observers: ObserverRegistry,
    download_dir: Option<PathBuf>,
    add_options: DaemonOptions,
    /// Consecutive status fetch failures per id; cleared by a successful fetch.
    fetch_failures: BTreeMap<String, u32>,
    dirty: bool,
    unpersisted: bool,
    stopped: bool,
}

impl<B, S> QueueOrchestrator<B, S>
where
    B: DownloadBackend,
    S: SnapshotStore,
{
    /// Builds an orchestrator seeded from persisted `history`.
    ///
    /// Records with an empty id, and later duplicates of an id already seen,
    /// are dropped.
    pub fn new(backend: B, store: S, config: &AppConfig, history: Vec<DownloadRecord>) -> Self {
        let mut downloads = BTreeMap::new();
        for record in history {
            if record.id.is_empty() {
                warn!(url = %record.source_url, "Dropping history record without an id");
                continue;
            }
            if downloads.contains_key(&record.id) {
                warn!(id = %record.id, "Dropping duplicate history record");
                continue;
            }
            downloads.insert(record.id.clone(), record.normalized());
        }
        debug!(records = downloads.len(), "Seeded download queue from history");

        let download_dir = if config.default_path.as_os_str().is_empty() {
            None
        } else {
            Some(config.default_path.clone())
        };

        Self {
            backend,
            store,
            downloads,
            observers: ObserverRegistry::default(),
            download_dir,
            add_options: DaemonOptions::new(),
            fetch_failures: BTreeMap::new(),
            dirty: false,
            unpersisted: false,
            stopped: false,
        }
    }

    /// Sets extra daemon options passed with every add request.
    #[must_use]
    pub fn with_add_options(mut self, options: DaemonOptions) -> Self {
        self.add_options = options;
        self
    }

    /// Replaces the observer registry, e.g. to change its capacity.
    #[must_use]
    pub fn with_observer_registry(mut self, observers: ObserverRegistry) -> Self {
        self.observers = observers;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DownloadRecord> {
        self.downloads.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    /// Returns true when changes are waiting for the next flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns true when the last write to the store failed.
    #[must_use]
    pub fn is_unpersisted(&self) -> bool {
        self.unpersisted
    }

    /// Returns true once [`Self::shutdown`] has run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// All records, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DownloadRecord> {
        self.downloads.values().cloned().collect()
    }

    /// Returns true when any record is active, waiting or queued.
    #[must_use]
    pub fn has_active_downloads(&self) -> bool {
        self.downloads
            .values()
            .any(|record| record.status.is_in_flight())
    }

    /// Returns true when quitting would not interrupt a transfer.
    #[must_use]
    pub fn can_quit(&self) -> bool {
        !self.has_active_downloads()
    }

    /// Returns true when nothing is left to wait for: every in-flight record
    /// is one the daemon has failed to report on for
    /// [`UNREPORTED_AFTER_FAILURES`] polls in a row.
    ///
    /// Such records keep their status; they just stop blocking a caller that
    /// waits for the queue to drain.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.downloads
            .values()
            .filter(|record| record.status.is_in_flight())
            .all(|record| self.is_unreported(&record.id))
    }

    fn is_unreported(&self, id: &str) -> bool {
        self.fetch_failures
            .get(id)
            .is_some_and(|failures| *failures >= UNREPORTED_AFTER_FAILURES)
    }

    /// Queues every URL with the daemon, then flushes once.
    ///
    /// Blank entries are skipped. A URL the daemon refuses is still tracked,
    /// under a local id, with status `error` and the failure text.
    #[instrument(skip(self, urls))]
    pub async fn enqueue<I, U>(&mut self, urls: I)
    where
        I: IntoIterator<Item = U> + Send,
        I::IntoIter: Send,
        U: AsRef<str> + Send,
    {
        self.apply_enqueue(urls).await;
        self.flush(false);
    }

    /// Pauses `id` on the daemon and marks it paused locally if it was in flight.
    #[instrument(skip(self))]
    pub async fn pause(&mut self, id: &str) {
        self.apply_pause(id).await;
        self.flush(false);
    }

    /// Resumes `id` on the daemon and marks it active locally if it was paused.
    #[instrument(skip(self))]
    pub async fn resume(&mut self, id: &str) {
        self.apply_resume(id).await;
        self.flush(false);
    }

    /// Pauses everything; active and waiting records flip to paused at once.
    #[instrument(skip(self))]
    pub async fn pause_all(&mut self) {
        self.apply_pause_all().await;
        self.flush(false);
    }

    /// Resumes everything on the daemon. Local records are left for the next
    /// poll to update.
    #[instrument(skip(self))]
    pub async fn resume_all(&mut self) {
        self.backend.resume_all().await;
        self.flush(false);
    }

    /// Pauses all when anything is in flight, otherwise resumes all.
    #[instrument(skip(self))]
    pub async fn toggle_pause_all(&mut self) {
        self.apply_toggle_pause_all().await;
        self.flush(false);
    }

    /// Stops tracking `id`. The daemon is not contacted.
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &str) {
        self.apply_remove(id);
        self.flush(false);
    }

    /// Removes `id` from the daemon, then stops tracking it.
    #[instrument(skip(self))]
    pub async fn cancel(&mut self, id: &str) {
        self.backend.remove(id).await;
        self.apply_remove(id);
        self.flush(false);
    }

    /// Applies `action` without flushing.
    ///
    /// Use [`Self::flush_pending`] (or [`Self::dispatch`]) to persist and
    /// notify once a batch of actions is applied.
    pub async fn apply(&mut self, action: Action) {
        debug!(action = %action, "Applying action");
        match action {
            Action::Enqueue(urls) => self.apply_enqueue(urls).await,
            Action::Pause(id) => self.apply_pause(&id).await,
            Action::Resume(id) => self.apply_resume(&id).await,
            Action::Remove(id) => self.apply_remove(&id),
            Action::Cancel(id) => {
                self.backend.remove(&id).await;
                self.apply_remove(&id);
            }
            Action::PauseAll => self.apply_pause_all().await,
            Action::ResumeAll => self.backend.resume_all().await,
            Action::TogglePauseAll => self.apply_toggle_pause_all().await,
        }
    }

    /// Applies `action`, then flushes.
    #[instrument(skip(self), fields(action = action.name()))]
    pub async fn dispatch(&mut self, action: Action) {
        self.apply(action).await;
        self.flush(false);
    }

    /// Merges the daemon's view of every tracked id into the local records.
    ///
    /// A reported `removed` status is ignored; records only leave the queue
    /// through [`Self::remove`] or [`Self::cancel`]. Failures for one id are
    /// logged and do not stop the others. Flushes once, and only when
    /// something changed. Does nothing after [`Self::shutdown`].
    #[instrument(skip(self), fields(records = self.downloads.len()))]
    pub async fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();
        if self.stopped {
            return report;
        }

        let ids: Vec<String> = self.downloads.keys().cloned().collect();
        for id in ids {
            match self.backend.status(&id).await {
                Ok(remote) => {
                    report.checked += 1;
                    self.fetch_failures.remove(&id);
                    if let Some(record) = self.downloads.get_mut(&id)
                        && reconcile(record, &remote)
                    {
                        report.changed += 1;
                    }
                }
                Err(error) => {
                    report.failed += 1;
                    let failures = self.fetch_failures.entry(id.clone()).or_insert(0);
                    *failures = failures.saturating_add(1);
                    let failures = *failures;
                    // Finished transfers are routinely purged by the daemon.
                    let settled = self
                        .downloads
                        .get(&id)
                        .is_some_and(|record| record.status.is_terminal());
                    if settled || failures > UNREPORTED_AFTER_FAILURES {
                        debug!(id = %id, failures, error = %error, "Status unavailable");
                    } else if failures == UNREPORTED_AFTER_FAILURES {
                        warn!(
                            id = %id,
                            failures,
                            error = %error,
                            "Daemon keeps failing to report on download; no longer waiting for it"
                        );
                    } else {
                        warn!(id = %id, error = %error, "Failed to fetch download status");
                    }
                }
            }
        }

        if report.changed > 0 {
            self.dirty = true;
            self.flush(false);
        }
        report
    }

    /// Registers `callback` and invokes it at once with the current snapshot.
    ///
    /// Returns `None` (and does not invoke the callback) when the registry is
    /// full. A callback that panics on this first call is not registered.
    pub fn subscribe(&mut self, callback: ObserverCallback) -> Option<ObserverId> {
        if self.observers.is_full() {
            warn!(observers = self.observers.len(), "Observer registry is full; subscription refused");
            return None;
        }
        if !observer::invoke(&callback, &self.snapshot()) {
            error!("Observer panicked on its first snapshot; subscription refused");
            return None;
        }
        self.observers.register(callback)
    }

    /// Unregisters an observer; returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    /// Stops polling and forces a final flush. Later calls do nothing.
    #[instrument(skip(self))]
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.flush(true);
        info!(records = self.downloads.len(), "Download orchestrator stopped");
    }

    /// Persists and notifies if anything changed since the last flush.
    pub fn flush_pending(&mut self) {
        self.flush(false);
    }

    async fn apply_enqueue<I, U>(&mut self, urls: I)
    where
        I: IntoIterator<Item = U> + Send,
        I::IntoIter: Send,
        U: AsRef<str> + Send,
    {
        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            let record = match self
                .backend
                .add(url, &self.add_options, self.download_dir.as_deref())
                .await
            {
                Ok(added) => DownloadRecord::new(added.id, url, added.filename),
                Err(error) => {
                    warn!(url, error = %error, "Daemon refused download; tracking it as failed");
                    let id = format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4().simple());
                    let mut record = DownloadRecord::new(id, url, guess_filename(url));
                    record.status = DownloadStatus::Error;
                    record.error = Some(format!("failed to queue download: {error}"));
                    record
                }
            };
            if self.downloads.contains_key(&record.id) {
                warn!(id = %record.id, "Daemon reused a tracked id; replacing the record");
            }
            self.fetch_failures.remove(&record.id);
            info!(id = %record.id, url, status = %record.status, "Download enqueued");
            self.downloads.insert(record.id.clone(), record);
            self.dirty = true;
        }
    }

    async fn apply_pause(&mut self, id: &str) {
        self.backend.pause(id).await;
        self.transition(id, DownloadStatus::can_pause, DownloadStatus::Paused);
    }

    async fn apply_resume(&mut self, id: &str) {
        self.backend.resume(id).await;
        self.transition(id, DownloadStatus::can_resume, DownloadStatus::Active);
    }

    async fn apply_pause_all(&mut self) {
        self.backend.pause_all().await;
        for record in self.downloads.values_mut() {
            if matches!(
                record.status,
                DownloadStatus::Active | DownloadStatus::Waiting
            ) {
                record.status = DownloadStatus::Paused;
                self.dirty = true;
            }
        }
    }

    async fn apply_toggle_pause_all(&mut self) {
        if self.has_active_downloads() {
            self.apply_pause_all().await;
        } else {
            self.backend.resume_all().await;
        }
    }

    fn apply_remove(&mut self, id: &str) {
        self.fetch_failures.remove(id);
        if self.downloads.remove(id).is_some() {
            info!(id, "Download removed from queue");
            self.dirty = true;
        } else {
            debug!(id, "Remove requested for unknown download");
        }
    }

    /// Optimistically moves `id` to `to` when `allowed` holds for its status.
    fn transition(&mut self, id: &str, allowed: fn(&DownloadStatus) -> bool, to: DownloadStatus) {
        let Some(record) = self.downloads.get_mut(id) else {
            debug!(id, "Action targets unknown download");
            return;
        };
        if allowed(&record.status) {
            record.status = to;
            self.dirty = true;
        } else {
            debug!(id, status = %record.status, target = %to, "Transition not allowed; leaving status");
        }
    }

    fn flush(&mut self, force: bool) {
        if !self.dirty && !force {
            return;
        }
        let snapshot = self.snapshot();
        match self.store.save_downloads(&snapshot) {
            Ok(()) => {
                if self.unpersisted {
                    info!("Download history persisted again");
                    self.unpersisted = false;
                }
            }
            Err(error) => {
                error!(
                    error = %error,
                    records = snapshot.len(),
                    "Failed to persist download history; in-memory state is unpersisted"
                );
                self.unpersisted = true;
            }
        }
        self.observers.notify(&snapshot);
        self.dirty = false;
    }
}

impl<B, S> fmt::Debug for QueueOrchestrator<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueOrchestrator")
            .field("downloads", &self.downloads.len())
            .field("observers", &self.observers)
            .field("download_dir", &self.download_dir)
            .field("dirty", &self.dirty)
            .field("unpersisted", &self.unpersisted)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

/// Merges one daemon report into `record`; returns whether anything changed.
fn reconcile(record: &mut DownloadRecord, remote: &RemoteStatus) -> bool {
    let mut changed = false;

    match remote.status {
        Some(DownloadStatus::Removed) => {
            debug!(id = %record.id, "Daemon reports download removed; keeping local record");
        }
        Some(status) if status != record.status => {
            debug!(id = %record.id, from = %record.status, to = %status, "Status changed");
            record.status = status;
            changed = true;
        }
        _ => {}
    }

    if let Some(progress) = remote.progress {
        let progress = clamp_progress(progress);
        if (progress - record.progress).abs() > PROGRESS_EPSILON {
            record.progress = progress;
            changed = true;
        }
    }

    if remote.speed != record.speed {
        record.speed = remote.speed;
        changed = true;
    }

    if let Some(path) = &remote.path
        && record.destination.as_ref() != Some(path)
    {
        record.destination = Some(path.clone());
        changed = true;
    }

    if let Some(message) = &remote.error
        && record.error.as_ref() != Some(message)
    {
        record.error = Some(message.clone());
        changed = true;
    }

    changed
}
