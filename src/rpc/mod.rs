//! Facade over the RPC channel to the external download daemon.
//!
//! [`RemoteDownloadClient`] is chosen once at construction:
//!
//! - [`RemoteDownloadClient::Live`] talks JSON-RPC to aria2 via [`Aria2Rpc`]
//! - [`RemoteDownloadClient::Mock`] synthesizes ids and reports a neutral status,
//!   so the rest of the system keeps working when no daemon is reachable
//!
//! Both variants expose the same contract. Control calls (pause, resume, remove
//! and the bulk variants) are best-effort: failures are logged here and never
//! returned, and the next reconciliation poll corrects any drift.
//!
//! # Example
//!
//! ```no_run
//! use superdownload_core::rpc::{DaemonOptions, RemoteDownloadClient, RpcSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RemoteDownloadClient::connect(&RpcSettings::default()).await;
//! let added = client
//!     .add("https://example.com/file.zip", &DaemonOptions::new(), None)
//!     .await?;
//! let status = client.status(&added.id).await?;
//! println!("{} -> {:?}", added.filename, status.status);
//! # Ok(())
//! # }
//! ```

mod aria2;
pub mod constants;
mod error;
pub mod filename;

pub use aria2::Aria2Rpc;
pub use error::RpcError;
pub use filename::{guess_filename, resolve_unique_filename};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::record::DownloadStatus;
use constants::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT, RPC_CONNECT_TIMEOUT, RPC_REQUEST_TIMEOUT};

/// Per-transfer or global daemon options (aria2 takes string values).
pub type DaemonOptions = BTreeMap<String, String>;

/// How to reach the daemon.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    /// Host with scheme, e.g. `http://localhost`.
    pub host: String,
    pub port: u16,
    /// RPC secret token (`--rpc-secret` on the daemon side).
    pub secret: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            secret: None,
            connect_timeout: RPC_CONNECT_TIMEOUT,
            request_timeout: RPC_REQUEST_TIMEOUT,
        }
    }
}

impl RpcSettings {
    /// Full JSON-RPC endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}/jsonrpc", self.host.trim_end_matches('/'), self.port)
    }
}

/// Result of queueing a new transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedDownload {
    /// Daemon-assigned or synthesized id.
    pub id: String,
    /// Final display/destination name, after collision resolution.
    pub filename: String,
}

/// Daemon-reported state of one transfer.
///
/// `None` fields mean "not reported"; reconciliation leaves the local value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteStatus {
    pub status: Option<DownloadStatus>,
    /// `clamp(completed / total, 0, 1)`.
    pub progress: Option<f64>,
    /// Bytes per second.
    pub speed: u64,
    pub path: Option<PathBuf>,
    /// Failure detail when the daemon reports `error`.
    pub error: Option<String>,
}

impl RemoteStatus {
    /// The inert status reported in degraded mode.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Which variant a client ended up as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Live,
    Mock,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Stand-in daemon used when no real one is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDaemon;

impl MockDaemon {
    /// Returns a locally unique id.
    #[must_use]
    pub fn synthesize_id(&self) -> String {
        format!("mock-{}", Uuid::new_v4().simple())
    }
}

/// Client for the download daemon, live or degraded.
#[derive(Debug)]
pub enum RemoteDownloadClient {
    Live(Aria2Rpc),
    Mock(MockDaemon),
}

impl RemoteDownloadClient {
    /// Connects to the daemon described by `settings`.
    ///
    /// Probes the daemon with `aria2.getVersion`; if the probe fails for any
    /// reason the client degrades to [`RemoteDownloadClient::Mock`] for its
    /// whole lifetime.
    #[instrument(skip(settings), fields(endpoint = %settings.endpoint()))]
    pub async fn connect(settings: &RpcSettings) -> Self {
        let rpc = match Aria2Rpc::with_timeouts(
            &settings.endpoint(),
            settings.secret.clone(),
            settings.connect_timeout,
            settings.request_timeout,
        ) {
            Ok(rpc) => rpc,
            Err(error) => {
                warn!(error = %error, "Daemon client unavailable; running in degraded mode");
                return Self::mock();
            }
        };

        match rpc.get_version().await {
            Ok(version) => {
                info!(version = %version, "Connected to download daemon");
                Self::Live(rpc)
            }
            Err(error) => {
                warn!(error = %error, "Download daemon unreachable; running in degraded mode");
                Self::mock()
            }
        }
    }

    /// Creates a degraded client directly.
    #[must_use]
    pub fn mock() -> Self {
        Self::Mock(MockDaemon)
    }

    #[must_use]
    pub fn mode(&self) -> ClientMode {
        match self {
            Self::Live(_) => ClientMode::Live,
            Self::Mock(_) => ClientMode::Mock,
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.mode() == ClientMode::Live
    }

    /// Requests a new transfer of `url`.
    ///
    /// When `destination_dir` is given the display name is made unique within
    /// it (`name(1).ext`, `name(2).ext`, ...) and passed to the daemon as `out`
    /// if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the live daemon rejects or cannot receive the
    /// request. Degraded mode never fails.
    #[instrument(skip(self, options), fields(mode = %self.mode()))]
    pub async fn add(
        &self,
        url: &str,
        options: &DaemonOptions,
        destination_dir: Option<&Path>,
    ) -> Result<AddedDownload, RpcError> {
        let guessed = guess_filename(url);
        let filename = match destination_dir {
            Some(dir) => resolve_unique_filename(dir, &guessed),
            None => guessed.clone(),
        };

        match self {
            Self::Mock(mock) => {
                let id = mock.synthesize_id();
                warn!(id = %id, url, "No download daemon; using a mock download id");
                Ok(AddedDownload { id, filename })
            }
            Self::Live(rpc) => {
                let mut options = options.clone();
                if let Some(dir) = destination_dir {
                    options.insert("dir".to_string(), dir.display().to_string());
                }
                if filename != guessed {
                    info!(filename = %filename, "File exists, using unique name");
                    options.insert("out".to_string(), filename.clone());
                }
                let id = rpc.add_uri(url, &options).await?;
                info!(id = %id, "Queued download on daemon");
                Ok(AddedDownload { id, filename })
            }
        }
    }

    /// Fetches the daemon's view of transfer `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the live daemon cannot report on `id`.
    pub async fn status(&self, id: &str) -> Result<RemoteStatus, RpcError> {
        match self {
            Self::Mock(_) => Ok(RemoteStatus::neutral()),
            Self::Live(rpc) => rpc.tell_status(id).await,
        }
    }

    pub async fn pause(&self, id: &str) {
        if let Self::Live(rpc) = self
            && let Err(error) = rpc.pause(id).await
        {
            warn!(id, error = %error, "Failed to pause download");
        }
    }

    pub async fn resume(&self, id: &str) {
        if let Self::Live(rpc) = self
            && let Err(error) = rpc.unpause(id).await
        {
            warn!(id, error = %error, "Failed to resume download");
        }
    }

    pub async fn pause_all(&self) {
        if let Self::Live(rpc) = self
            && let Err(error) = rpc.pause_all().await
        {
            warn!(error = %error, "Failed to pause all downloads");
        }
    }

    pub async fn resume_all(&self) {
        if let Self::Live(rpc) = self
            && let Err(error) = rpc.unpause_all().await
        {
            warn!(error = %error, "Failed to resume all downloads");
        }
    }

    /// Stops the transfer on the daemon. Local tracking is the caller's concern.
    pub async fn remove(&self, id: &str) {
        if let Self::Live(rpc) = self {
            match rpc.force_remove(id).await {
                Ok(()) => info!(id, "Removed download from daemon"),
                Err(error) => warn!(id, error = %error, "Failed to remove download"),
            }
        }
    }

    /// Pushes concurrency and bandwidth limits to the daemon.
    ///
    /// A `max_global_speed` of zero means unlimited.
    pub async fn apply_limits(&self, max_concurrent: u32, max_global_speed: u64) {
        let Self::Live(rpc) = self else {
            return;
        };
        let mut options = DaemonOptions::new();
        options.insert(
            "max-concurrent-downloads".to_string(),
            max_concurrent.max(1).to_string(),
        );
        options.insert(
            "max-overall-download-limit".to_string(),
            max_global_speed.to_string(),
        );
        if let Err(error) = rpc.change_global_option(&options).await {
            warn!(error = %error, "Failed to apply daemon limits");
        }
    }
}
