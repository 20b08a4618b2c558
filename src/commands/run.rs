//! `run`: queue URLs and watch the queue until nothing is in flight.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use superdownload_core::{
    ClientMode, DownloadRecord, DownloadStatus, OrchestratorHandle, OrchestratorRuntime,
    PersistenceStore, QueueOrchestrator, RemoteDownloadClient, RpcSettings,
};
use tracing::{info, warn};

use crate::app::progress::ProgressView;
use crate::app::terminal::{is_dumb_terminal, should_use_spinner};
use crate::cli::{Args, RunArgs};

/// URL schemes the daemon is asked to fetch.
const SUPPORTED_SCHEMES: [&str; 4] = ["http://", "https://", "ftp://", "sftp://"];

pub async fn run_download_command(args: &Args, run: &RunArgs, state_dir: &Path) -> Result<()> {
    let (urls, rejected) = partition_urls(&run.urls);
    for url in &rejected {
        warn!(url = %url, "Skipping unsupported URL; expected http, https, ftp or sftp");
    }

    let store = PersistenceStore::open(state_dir);
    let config = store.config().clone();
    let history = store.history().to_vec();

    let settings = RpcSettings {
        host: args.rpc_host.clone(),
        port: args.rpc_port,
        secret: args.rpc_secret.clone(),
        ..RpcSettings::default()
    };
    let client = RemoteDownloadClient::connect(&settings).await;
    client
        .apply_limits(config.max_concurrent, config.max_global_speed)
        .await;
    let mode = client.mode();
    info!(
        mode = %mode,
        records = history.len(),
        download_dir = %config.default_path.display(),
        "Download queue ready"
    );

    let poll_interval = Duration::from_millis(args.poll_interval_ms);
    let orchestrator = QueueOrchestrator::new(client, store, &config, history);
    let handle = OrchestratorRuntime::spawn(orchestrator, poll_interval);

    let progress = ProgressView::new(should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        is_dumb_terminal(),
    ));
    if handle.subscribe(progress.observer()).await?.is_none() {
        warn!("Progress view could not subscribe to queue updates");
    }

    if !urls.is_empty() {
        handle.enqueue(urls).await?;
    }

    if mode == ClientMode::Mock && !run.keep_running {
        warn!("No download daemon; queued downloads are saved and will not progress until one is running");
    } else {
        watch_queue(&handle, run.keep_running, poll_interval).await?;
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;
    progress.finish();
    log_summary(&snapshot);
    Ok(())
}

/// Waits until the queue drains (unless `keep_running`) or the user quits.
///
/// Records the daemon has stopped reporting on do not hold up the drain.
/// Ctrl-C quits at once when nothing is left to wait for; otherwise a second
/// Ctrl-C is needed.
async fn watch_queue(
    handle: &OrchestratorHandle,
    keep_running: bool,
    poll_interval: Duration,
) -> Result<()> {
    let mut interrupts = interrupt_listener().context("failed to listen for Ctrl-C")?;
    let mut check = tokio::time::interval(poll_interval);
    let mut quit_requested = false;
    info!("Watching download queue; press Ctrl-C to stop");

    loop {
        tokio::select! {
            Some(()) = interrupts.recv() => {
                if quit_requested || handle.is_drained().await? {
                    info!("Interrupted; stopping");
                    return Ok(());
                }
                quit_requested = true;
                warn!("Downloads are still in progress; press Ctrl-C again to quit");
            }
            _ = check.tick() => {
                if !keep_running && handle.is_drained().await? {
                    return Ok(());
                }
            }
        }
    }
}

/// One Ctrl-C listener for the whole watch, so presses that land while a
/// check is running are still delivered.
#[cfg(unix)]
fn interrupt_listener() -> io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn interrupt_listener() -> io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}

/// Splits arguments into supported URLs and rejected input.
pub(crate) fn partition_urls(args: &[String]) -> (Vec<String>, Vec<String>) {
    args.iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .partition(|arg| is_supported_url(arg))
}

pub(crate) fn is_supported_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    SUPPORTED_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn log_summary(records: &[DownloadRecord]) {
    let count = |status: DownloadStatus| records.iter().filter(|r| r.status == status).count();
    info!(
        total = records.len(),
        complete = count(DownloadStatus::Complete),
        failed = count(DownloadStatus::Error),
        paused = count(DownloadStatus::Paused),
        in_flight = records.iter().filter(|r| r.status.is_in_flight()).count(),
        "Download queue closed"
    );
}
