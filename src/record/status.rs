//! Transfer lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a tracked transfer.
///
/// `Removed` exists so daemon reports can be decoded; the orchestrator never
/// stores it, because removal means the record leaves the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Accepted locally, not yet confirmed by the daemon.
    #[default]
    Queued,
    /// Waiting in the daemon's queue for a free slot.
    Waiting,
    /// Currently transferring.
    Active,
    /// Paused by the user.
    Paused,
    /// Finished successfully.
    Complete,
    /// Failed; see the record's `error` field.
    Error,
    /// Removed from the daemon.
    Removed,
}

impl DownloadStatus {
    /// Returns the wire/document string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Removed => "removed",
        }
    }

    /// Terminal states never transition again except through explicit removal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Removed)
    }

    /// States that block a clean quit.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Active | Self::Waiting | Self::Queued)
    }

    #[must_use]
    pub fn can_pause(&self) -> bool {
        self.is_in_flight()
    }

    #[must_use]
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            "removed" => Ok(Self::Removed),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_status_as_str_matches_display() {
        for status in [
            DownloadStatus::Queued,
            DownloadStatus::Waiting,
            DownloadStatus::Active,
            DownloadStatus::Paused,
            DownloadStatus::Complete,
            DownloadStatus::Error,
            DownloadStatus::Removed,
        ] {
            assert_eq!(status.to_string(), status.as_str());
            assert_eq!(status.as_str().parse::<DownloadStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_download_status_from_str_invalid() {
        let result = "mock".parse::<DownloadStatus>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("invalid download status"));
    }

    #[test]
    fn test_download_status_serde_uses_lowercase() {
        let json = serde_json::to_string(&DownloadStatus::Complete).unwrap();
        assert_eq!(json, "\"complete\"");
        let parsed: DownloadStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(parsed, DownloadStatus::Paused);
    }

    #[test]
    fn test_in_flight_states_block_quit() {
        assert!(DownloadStatus::Queued.is_in_flight());
        assert!(DownloadStatus::Waiting.is_in_flight());
        assert!(DownloadStatus::Active.is_in_flight());
        assert!(!DownloadStatus::Paused.is_in_flight());
        assert!(!DownloadStatus::Complete.is_in_flight());
        assert!(!DownloadStatus::Error.is_in_flight());
    }

    #[test]
    fn test_pause_and_resume_eligibility() {
        assert!(DownloadStatus::Active.can_pause());
        assert!(!DownloadStatus::Complete.can_pause());
        assert!(DownloadStatus::Paused.can_resume());
        assert!(!DownloadStatus::Error.can_resume());
    }

    #[test]
    fn test_terminal_states() {
        assert!(DownloadStatus::Complete.is_terminal());
        assert!(DownloadStatus::Error.is_terminal());
        assert!(!DownloadStatus::Paused.is_terminal());
    }
}
