//! The daemon-facing seam of the orchestrator.

use std::path::Path;

use async_trait::async_trait;

use crate::rpc::{AddedDownload, DaemonOptions, RemoteDownloadClient, RemoteStatus, RpcError};

/// Operations the orchestrator needs from a download daemon.
///
/// Implemented by [`RemoteDownloadClient`]; tests substitute scripted daemons.
/// Control calls return nothing because failures are absorbed (and logged) by
/// the implementation.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Queues `url`, returning the assigned id and the collision-free filename.
    async fn add(
        &self,
        url: &str,
        options: &DaemonOptions,
        destination_dir: Option<&Path>,
    ) -> Result<AddedDownload, RpcError>;

    /// Reports the daemon's view of transfer `id`.
    async fn status(&self, id: &str) -> Result<RemoteStatus, RpcError>;

    async fn pause(&self, id: &str);

    async fn resume(&self, id: &str);

    async fn pause_all(&self);

    async fn resume_all(&self);

    /// Stops the transfer on the daemon.
    async fn remove(&self, id: &str);
}

#[async_trait]
impl DownloadBackend for RemoteDownloadClient {
    async fn add(
        &self,
        url: &str,
        options: &DaemonOptions,
        destination_dir: Option<&Path>,
    ) -> Result<AddedDownload, RpcError> {
        RemoteDownloadClient::add(self, url, options, destination_dir).await
    }

    async fn status(&self, id: &str) -> Result<RemoteStatus, RpcError> {
        RemoteDownloadClient::status(self, id).await
    }

    async fn pause(&self, id: &str) {
        RemoteDownloadClient::pause(self, id).await;
    }

    async fn resume(&self, id: &str) {
        RemoteDownloadClient::resume(self, id).await;
    }

    async fn pause_all(&self) {
        RemoteDownloadClient::pause_all(self).await;
    }

    async fn resume_all(&self) {
        RemoteDownloadClient::resume_all(self).await;
    }

    async fn remove(&self, id: &str) {
        RemoteDownloadClient::remove(self, id).await;
    }
}
