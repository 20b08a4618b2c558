//! Constants for the daemon RPC channel (endpoint defaults, timeouts).

use std::time::Duration;

/// Default daemon host, scheme included.
pub const DEFAULT_RPC_HOST: &str = "http://localhost";

/// Default aria2 RPC port.
pub const DEFAULT_RPC_PORT: u16 = 6800;

/// Connect timeout for RPC calls.
pub const RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Whole-request timeout for RPC calls. Keeps a hung daemon from stalling a poll tick.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
