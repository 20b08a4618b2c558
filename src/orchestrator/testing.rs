//! Scripted daemon and counting store shared by the orchestrator unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::DownloadBackend;
use crate::persistence::{PersistenceError, SnapshotStore};
use crate::record::{DownloadRecord, DownloadStatus};
use crate::rpc::{AddedDownload, DaemonOptions, RemoteStatus, RpcError, guess_filename};

#[derive(Debug, Default)]
struct Script {
    calls: Vec<String>,
    statuses: HashMap<String, RemoteStatus>,
    failing_status: HashSet<String>,
    refuse_adds: bool,
    next_id: usize,
}

/// Daemon double that records calls and answers from a script.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedBackend(Arc<Mutex<Script>>);

impl ScriptedBackend {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    pub(crate) fn report(&self, id: &str, status: RemoteStatus) {
        self.0.lock().unwrap().statuses.insert(id.to_string(), status);
    }

    pub(crate) fn fail_status(&self, id: &str) {
        self.0.lock().unwrap().failing_status.insert(id.to_string());
    }

    pub(crate) fn recover_status(&self, id: &str) {
        self.0.lock().unwrap().failing_status.remove(id);
    }

    pub(crate) fn refuse_adds(&self) {
        self.0.lock().unwrap().refuse_adds = true;
    }

    fn record(&self, call: String) {
        self.0.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl DownloadBackend for ScriptedBackend {
    async fn add(
        &self,
        url: &str,
        _options: &DaemonOptions,
        _destination_dir: Option<&Path>,
    ) -> Result<AddedDownload, RpcError> {
        let mut script = self.0.lock().unwrap();
        script.calls.push(format!("add {url}"));
        if script.refuse_adds {
            return Err(RpcError::Daemon {
                method: "aria2.addUri".to_string(),
                code: 1,
                message: "unsupported scheme".to_string(),
            });
        }
        script.next_id += 1;
        Ok(AddedDownload {
            id: format!("g{}", script.next_id),
            filename: guess_filename(url),
        })
    }

    async fn status(&self, id: &str) -> Result<RemoteStatus, RpcError> {
        let script = self.0.lock().unwrap();
        if script.failing_status.contains(id) {
            return Err(RpcError::Timeout {
                method: "aria2.tellStatus".to_string(),
            });
        }
        Ok(script.statuses.get(id).cloned().unwrap_or_default())
    }

    async fn pause(&self, id: &str) {
        self.record(format!("pause {id}"));
    }

    async fn resume(&self, id: &str) {
        self.record(format!("resume {id}"));
    }

    async fn pause_all(&self) {
        self.record("pause_all".to_string());
    }

    async fn resume_all(&self) {
        self.record("resume_all".to_string());
    }

    async fn remove(&self, id: &str) {
        self.record(format!("remove {id}"));
    }
}

/// Store double counting writes and keeping the last snapshot.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingStore {
    pub(crate) writes: Arc<AtomicUsize>,
    pub(crate) last: Arc<Mutex<Vec<DownloadRecord>>>,
    pub(crate) fail: bool,
}

impl CountingStore {
    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for CountingStore {
    fn save_downloads(&mut self, records: &[DownloadRecord]) -> Result<(), PersistenceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersistenceError::io(
                "history.json",
                std::io::Error::other("disk full"),
            ));
        }
        *self.last.lock().unwrap() = records.to_vec();
        Ok(())
    }
}

pub(crate) fn reported(status: DownloadStatus) -> RemoteStatus {
    RemoteStatus {
        status: Some(status),
        ..RemoteStatus::default()
    }
}
