//! Value types describing one tracked transfer.
//!
//! - [`DownloadRecord`] - a transfer as seen by the orchestrator and its observers
//! - [`DownloadStatus`] - lifecycle states

mod status;

pub use status::DownloadStatus;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Open mapping for fields the orchestrator does not interpret.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// A single tracked transfer.
///
/// Serialized with camelCase keys. `gid` and `url` are accepted on input so
/// older history files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    /// Daemon-assigned id (or a locally synthesized one in degraded mode).
    #[serde(alias = "gid", default)]
    pub id: String,
    /// The requested resource locator.
    #[serde(alias = "url", default)]
    pub source_url: String,
    /// Display/destination name, possibly rewritten to avoid a collision.
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub status: DownloadStatus,
    /// Fraction in `[0.0, 1.0]`; write through [`DownloadRecord::set_progress`].
    #[serde(default)]
    pub progress: f64,
    /// Transfer rate in bytes per second.
    #[serde(default)]
    pub speed: u64,
    #[serde(default)]
    pub error: Option<String>,
    /// Absolute path on disk once the daemon reports it.
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub extra: ExtraFields,
}

impl DownloadRecord {
    /// Creates a freshly queued record.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            filename: filename.into(),
            status: DownloadStatus::Queued,
            progress: 0.0,
            speed: 0,
            error: None,
            destination: None,
            extra: ExtraFields::new(),
        }
    }

    /// Sets progress, clamped to `[0.0, 1.0]`. NaN reads as zero.
    pub fn set_progress(&mut self, progress: f64) {
        self.progress = clamp_progress(progress);
    }

    /// Restores invariants on a record decoded from an untrusted document.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.progress = clamp_progress(self.progress);
        self
    }

    /// Name shown to users: the filename, or the URL when no name is known.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.filename.is_empty() {
            &self.source_url
        } else {
            &self.filename
        }
    }
}

pub(crate) fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

impl fmt::Display for DownloadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DownloadRecord {{ id: {}, name: {}, status: {} }}",
            self.id,
            self.display_name(),
            self.status
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_queued_and_idle() {
        let record = DownloadRecord::new("abc", "https://example.com/a.zip", "a.zip");
        assert_eq!(record.status, DownloadStatus::Queued);
        assert!(record.progress.abs() < f64::EPSILON);
        assert_eq!(record.speed, 0);
        assert!(record.error.is_none());
        assert!(record.destination.is_none());
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_set_progress_clamps() {
        let mut record = DownloadRecord::new("abc", "https://example.com/a.zip", "a.zip");
        record.set_progress(1.7);
        assert!((record.progress - 1.0).abs() < f64::EPSILON);
        record.set_progress(-0.2);
        assert!(record.progress.abs() < f64::EPSILON);
        record.set_progress(f64::NAN);
        assert!(record.progress.abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let record = DownloadRecord::new("abc", "https://example.com/a.zip", "a.zip");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["sourceUrl"], "https://example.com/a.zip");
        assert_eq!(value["status"], "queued");
        assert!(value.get("source_url").is_none());
    }

    #[test]
    fn test_deserializes_legacy_gid_and_url_keys() {
        let json = r#"{"gid":"2089b05ecca3d829","url":"https://example.com/b.iso","filename":"b.iso","status":"complete","progress":1.0}"#;
        let record: DownloadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "2089b05ecca3d829");
        assert_eq!(record.source_url, "https://example.com/b.iso");
        assert_eq!(record.status, DownloadStatus::Complete);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let record: DownloadRecord = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(record.status, DownloadStatus::Queued);
        assert_eq!(record.speed, 0);
        assert!(record.filename.is_empty());
    }

    #[test]
    fn test_normalized_clamps_out_of_range_progress() {
        let record: DownloadRecord =
            serde_json::from_str(r#"{"id":"x","progress":3.5}"#).unwrap();
        assert!((record.normalized().progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_name_falls_back_to_url() {
        let record = DownloadRecord::new("x", "https://example.com/", "");
        assert_eq!(record.display_name(), "https://example.com/");
        assert!(record.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_extra_fields_roundtrip_opaquely() {
        let json = r#"{"id":"x","extra":{"referer":"https://example.com","retries":2}}"#;
        let record: DownloadRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.extra["retries"], 2);
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["extra"]["referer"], "https://example.com");
    }
}
