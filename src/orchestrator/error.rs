//! Error type for the orchestrator handle.

use thiserror::Error;

/// Errors returned by [`super::OrchestratorHandle`].
///
/// Orchestrator operations themselves never fail; the only thing a handle can
/// report is that the control loop is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The control loop has shut down and no longer accepts commands.
    #[error("download orchestrator has shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_display() {
        assert_eq!(
            OrchestratorError::Shutdown.to_string(),
            "download orchestrator has shut down"
        );
    }
}
