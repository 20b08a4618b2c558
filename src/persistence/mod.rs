//! Durable JSON snapshots of the download history and the app configuration.
//!
//! Two documents live in the state directory:
//! - `history.json` - array of [`DownloadRecord`]s
//! - `config.json` - [`AppConfig`]
//!
//! Reads never fail: a missing file is normal, and unreadable or corrupt
//! documents are logged and replaced by defaults. Writes report their errors so
//! the caller can decide how loudly to complain; the in-memory state stays
//! authoritative either way.
//!
//! # Example
//!
//! ```no_run
//! use superdownload_core::persistence::{ConfigPatch, PersistenceStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = PersistenceStore::open("/tmp/superdownload-state");
//! let (config, history) = store.load();
//! println!("{} known downloads, saving to {}", history.len(), config.default_path.display());
//!
//! store.save_config(&ConfigPatch { max_concurrent: Some(5), ..ConfigPatch::default() })?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;

pub use config::{AppConfig, ConfigPatch, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_GLOBAL_SPEED, Theme};
pub use error::PersistenceError;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::record::DownloadRecord;

/// File name of the history document.
pub const HISTORY_FILE: &str = "history.json";

/// File name of the config document.
pub const CONFIG_FILE: &str = "config.json";

/// Decimal places kept for `progress` on disk.
const PROGRESS_DECIMALS: i32 = 4;

/// Write-side contract the orchestrator needs from persistence.
pub trait SnapshotStore: Send {
    /// Replaces the stored record set with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the snapshot could not be written.
    fn save_downloads(&mut self, records: &[DownloadRecord]) -> Result<(), PersistenceError>;
}

/// JSON-file persistence rooted at a state directory.
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    state_dir: PathBuf,
    config: AppConfig,
    history: Vec<DownloadRecord>,
}

impl PersistenceStore {
    /// Opens (creating if needed) the state directory and reads both documents.
    ///
    /// Never fails; a directory that cannot be created is logged and later
    /// writes will report their own errors.
    #[must_use]
    pub fn open(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        if let Err(error) = fs::create_dir_all(&state_dir) {
            warn!(
                dir = %state_dir.display(),
                error = %error,
                "Could not create state directory"
            );
        }
        let mut store = Self {
            state_dir,
            config: AppConfig::default(),
            history: Vec::new(),
        };
        let (config, history) = store.load();
        store.config = config;
        store.history = history;
        store
    }

    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.state_dir.join(HISTORY_FILE)
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE)
    }

    /// Config as of the last load or save.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// History as read when the store was opened.
    #[must_use]
    pub fn history(&self) -> &[DownloadRecord] {
        &self.history
    }

    /// Reads both documents from disk, substituting defaults on any failure.
    #[must_use]
    pub fn load(&self) -> (AppConfig, Vec<DownloadRecord>) {
        let config = read_json::<AppConfig>(&self.config_path()).unwrap_or_default();
        let history = load_history(&self.history_path());
        (config, history)
    }

    /// Writes the full record set, progress rounded to four decimals.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when encoding or writing fails.
    pub fn save_downloads(&self, records: &[DownloadRecord]) -> Result<(), PersistenceError> {
        let rounded: Vec<DownloadRecord> = records
            .iter()
            .map(|record| {
                let mut record = record.clone();
                record.progress = round_progress(record.progress);
                record
            })
            .collect();
        write_json(&self.history_path(), &rounded)
    }

    /// Merges `patch` over the current config and writes the result.
    ///
    /// Keys absent from `patch` keep their current (default or previously
    /// saved) value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when encoding or writing fails; the cached
    /// config is only updated on success.
    pub fn save_config(&mut self, patch: &ConfigPatch) -> Result<AppConfig, PersistenceError> {
        let merged = self.config.merged(patch);
        write_json(&self.config_path(), &merged)?;
        self.config = merged.clone();
        Ok(merged)
    }
}

impl SnapshotStore for PersistenceStore {
    fn save_downloads(&mut self, records: &[DownloadRecord]) -> Result<(), PersistenceError> {
        PersistenceStore::save_downloads(self, records)
    }
}

fn round_progress(progress: f64) -> f64 {
    let factor = 10f64.powi(PROGRESS_DECIMALS);
    (progress * factor).round() / factor
}

/// Decodes history entry by entry so one bad record does not discard the rest.
fn load_history(path: &Path) -> Vec<DownloadRecord> {
    let Some(document) = read_json::<serde_json::Value>(path) else {
        return Vec::new();
    };
    let serde_json::Value::Array(entries) = document else {
        warn!(path = %path.display(), "History document is not an array; ignoring it");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<DownloadRecord>(entry) {
            Ok(record) if record.id.is_empty() => {
                warn!(index, "Skipping history entry without an id");
            }
            Ok(record) if !seen.insert(record.id.clone()) => {
                warn!(index, id = %record.id, "Skipping duplicate history entry");
            }
            Ok(record) => records.push(record.normalized()),
            Err(error) => {
                warn!(index, error = %error, "Skipping unreadable history entry");
            }
        }
    }
    records
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No document yet; using defaults");
            return None;
        }
        Err(error) => {
            warn!(error = %PersistenceError::io(path, error), "Failed to read document");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(error = %PersistenceError::json(path, error), "Failed to parse document");
            None
        }
    }
}

/// Writes through a sibling temp file and renames, so a crash mid-write never
/// leaves a truncated document behind.
fn write_json<T: Serialize + ?Sized>(path: &Path, payload: &T) -> Result<(), PersistenceError> {
    let encoded =
        serde_json::to_vec_pretty(payload).map_err(|error| PersistenceError::json(path, error))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, encoded).map_err(|error| PersistenceError::io(&tmp_path, error))?;
    fs::rename(&tmp_path, path).map_err(|error| PersistenceError::io(path, error))
}
