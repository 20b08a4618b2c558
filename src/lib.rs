//! `SuperDownload` Core Library
//!
//! Queue orchestration for downloads executed by an external aria2 daemon.
//! The library keeps an authoritative, persisted and observable view of every
//! download, reconciles it with the daemon on a fixed tick, and keeps working
//! (in a degraded mode) when no daemon is reachable.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`record`] - Download records and their lifecycle states
//! - [`rpc`] - aria2 JSON-RPC client with live and degraded variants
//! - [`persistence`] - JSON history and configuration documents
//! - [`orchestrator`] - The queue state machine and its control loop
//! - [`paths`] - State and download directory resolution

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod orchestrator;
pub mod paths;
pub mod persistence;
pub mod record;
pub mod rpc;

// Re-export commonly used types
pub use orchestrator::{
    Action, DownloadBackend, OrchestratorError, OrchestratorHandle, OrchestratorRuntime,
    POLL_INTERVAL, PollReport, QueueOrchestrator, UNREPORTED_AFTER_FAILURES,
};
pub use persistence::{AppConfig, ConfigPatch, PersistenceError, PersistenceStore, Theme};
pub use record::{DownloadRecord, DownloadStatus};
pub use rpc::{ClientMode, RemoteDownloadClient, RpcError, RpcSettings};
