//! Error types for daemon RPC calls.

use thiserror::Error;

/// Errors raised while talking to the download daemon.
///
/// Only `add` and `status` hand these to callers; the control calls
/// (pause/resume/remove) log and swallow them.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The configured endpoint is not a valid URL.
    #[error("invalid RPC endpoint: {endpoint}")]
    InvalidEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
    },

    /// Connection-level failure (refused, DNS, TLS, broken body).
    #[error("transport error calling {method}: {source}")]
    Transport {
        /// JSON-RPC method being called.
        method: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The daemon did not answer within the request timeout.
    #[error("timeout calling {method}")]
    Timeout {
        /// JSON-RPC method being called.
        method: String,
    },

    /// The daemon answered with a JSON-RPC error object.
    #[error("daemon rejected {method} (code {code}): {message}")]
    Daemon {
        /// JSON-RPC method being called.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Daemon-supplied message.
        message: String,
    },

    /// The response could not be understood.
    #[error("malformed response to {method}: {reason}")]
    MalformedResponse {
        /// JSON-RPC method being called.
        method: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl RpcError {
    /// Maps a reqwest error, separating timeouts from other transport failures.
    pub fn from_reqwest(method: impl Into<String>, source: reqwest::Error) -> Self {
        let method = method.into();
        if source.is_timeout() {
            Self::Timeout { method }
        } else {
            Self::Transport { method, source }
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Returns true when the daemon could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::InvalidEndpoint { .. }
        )
    }
}
