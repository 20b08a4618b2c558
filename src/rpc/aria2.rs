//! JSON-RPC transport to an aria2 daemon.
//!
//! Only the handful of methods the orchestrator needs are wrapped. Every call
//! carries the `token:<secret>` prefix when a secret is configured, and is
//! bounded by the client's connect/request timeouts so a hung daemon cannot
//! stall the control loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{RPC_CONNECT_TIMEOUT, RPC_REQUEST_TIMEOUT};
use super::{DaemonOptions, RemoteStatus, RpcError};
use crate::record::DownloadStatus;

/// Fields requested from `aria2.tellStatus`.
const STATUS_KEYS: [&str; 7] = [
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorMessage",
    "files",
];

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
}

/// Raw `aria2.tellStatus` payload. aria2 encodes numbers as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TellStatus {
    status: String,
    total_length: Option<String>,
    completed_length: Option<String>,
    download_speed: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    path: String,
}

/// aria2 JSON-RPC client.
#[derive(Debug)]
pub struct Aria2Rpc {
    client: Client,
    endpoint: Url,
    secret: Option<String>,
    next_request_id: AtomicU64,
}

impl Aria2Rpc {
    /// Creates a client for `endpoint` (e.g. `http://localhost:6800/jsonrpc`).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidEndpoint`] if the endpoint does not parse,
    /// or [`RpcError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, secret: Option<String>) -> Result<Self, RpcError> {
        Self::with_timeouts(endpoint, secret, RPC_CONNECT_TIMEOUT, RPC_REQUEST_TIMEOUT)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Same as [`Aria2Rpc::new`].
    pub fn with_timeouts(
        endpoint: &str,
        secret: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let endpoint = Url::parse(endpoint).map_err(|_| RpcError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
        })?;
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|source| RpcError::from_reqwest("client.build", source))?;
        Ok(Self {
            client,
            endpoint,
            secret: secret.filter(|s| !s.is_empty()),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the daemon version string; used as a connectivity probe.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the daemon is unreachable or answers badly.
    pub async fn get_version(&self) -> Result<String, RpcError> {
        #[derive(Deserialize)]
        struct Version {
            version: String,
        }
        let version: Version = self.call("aria2.getVersion", Vec::new()).await?;
        Ok(version.version)
    }

    /// Queues `url` and returns the daemon-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the daemon rejects or cannot receive the request.
    pub async fn add_uri(&self, url: &str, options: &DaemonOptions) -> Result<String, RpcError> {
        self.call("aria2.addUri", vec![json!([url]), json!(options)])
            .await
    }

    /// Fetches and normalizes the status of one transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the id is unknown or the daemon is unreachable.
    pub async fn tell_status(&self, id: &str) -> Result<RemoteStatus, RpcError> {
        let raw: TellStatus = self
            .call("aria2.tellStatus", vec![json!(id), json!(STATUS_KEYS)])
            .await?;
        Ok(normalize_status(raw))
    }

    /// Pauses one transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn pause(&self, id: &str) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.pause", vec![json!(id)])
            .await
    }

    /// Resumes one paused transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn unpause(&self, id: &str) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.unpause", vec![json!(id)])
            .await
    }

    /// Pauses every transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn pause_all(&self) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.pauseAll", Vec::new())
            .await
    }

    /// Resumes every paused transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn unpause_all(&self) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.unpauseAll", Vec::new())
            .await
    }

    /// Stops and removes a transfer without waiting for tracker/peer teardown.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn force_remove(&self, id: &str) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.forceRemove", vec![json!(id)])
            .await
    }

    /// Changes daemon-wide options such as concurrency and speed limits.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any daemon or transport failure.
    pub async fn change_global_option(&self, options: &DaemonOptions) -> Result<(), RpcError> {
        self.call_ignoring_result("aria2.changeGlobalOption", vec![json!(options)])
            .await
    }

    async fn call_ignoring_result(&self, method: &str, params: Vec<Value>) -> Result<(), RpcError> {
        let _: Value = self.call(method, params).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, params), fields(endpoint = %self.endpoint))]
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        mut params: Vec<Value>,
    ) -> Result<T, RpcError> {
        if let Some(secret) = &self.secret {
            params.insert(0, json!(format!("token:{secret}")));
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": request_id.to_string(),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| RpcError::from_reqwest(method, source))?;

        // aria2 reports faults with a 400 status and a JSON-RPC error body, so
        // the body is decoded before looking at the HTTP status.
        let http_status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| RpcError::from_reqwest(method, source))?;
        let decoded: RpcResponse<T> = serde_json::from_slice(&bytes).map_err(|err| {
            RpcError::malformed(method, format!("HTTP {}: {err}", http_status.as_u16()))
        })?;

        if let Some(fault) = decoded.error {
            debug!(method, code = fault.code, message = %fault.message, "Daemon returned an error");
            return Err(RpcError::Daemon {
                method: method.to_string(),
                code: fault.code,
                message: fault.message,
            });
        }
        decoded
            .result
            .ok_or_else(|| RpcError::malformed(method, "response has neither result nor error"))
    }
}

fn parse_count(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}

#[allow(clippy::cast_precision_loss)]
fn normalize_status(raw: TellStatus) -> RemoteStatus {
    let completed = parse_count(raw.completed_length.as_deref()).unwrap_or(0);
    let total = parse_count(raw.total_length.as_deref()).unwrap_or(1);
    let progress = if total == 0 {
        0.0
    } else {
        (completed as f64 / total as f64).clamp(0.0, 1.0)
    };

    let status = raw.status.parse::<DownloadStatus>().ok();
    if status.is_none() {
        debug!(status = %raw.status, "Unrecognized daemon status");
    }
    let error = match status {
        Some(DownloadStatus::Error) => raw.error_message.filter(|m| !m.is_empty()),
        _ => None,
    };
    let path = raw
        .files
        .into_iter()
        .next()
        .map(|file| file.path)
        .filter(|path| !path.is_empty())
        .map(Into::into);

    RemoteStatus {
        status,
        progress: Some(progress),
        speed: parse_count(raw.download_speed.as_deref()).unwrap_or(0),
        path,
        error,
    }
}
