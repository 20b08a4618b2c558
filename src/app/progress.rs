//! Progress UI (spinner) fed by orchestrator snapshots.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use superdownload_core::{DownloadRecord, DownloadStatus};

/// Spinner that renders the latest queue snapshot, or nothing when disabled.
pub(crate) struct ProgressView {
    spinner: Option<ProgressBar>,
}

impl ProgressView {
    pub(crate) fn new(use_spinner: bool) -> Self {
        if !use_spinner {
            return Self { spinner: None };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self {
            spinner: Some(spinner),
        }
    }

    /// Observer callback updating the spinner message.
    pub(crate) fn observer(&self) -> impl Fn(&[DownloadRecord]) + Send + 'static {
        let spinner = self.spinner.clone();
        move |records: &[DownloadRecord]| {
            if let Some(spinner) = &spinner {
                spinner.set_message(progress_message(records));
            }
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

/// One-line summary: settled/total, in-flight count, speed and the lead transfer.
pub(crate) fn progress_message(records: &[DownloadRecord]) -> String {
    if records.is_empty() {
        return "No downloads queued".to_string();
    }
    let settled = records.iter().filter(|r| r.status.is_terminal()).count();
    let in_flight = records.iter().filter(|r| r.status.is_in_flight()).count();
    let speed: u64 = records.iter().map(|r| r.speed).sum();

    let mut message = format!(
        "[{settled}/{}] {in_flight} in flight, {}",
        records.len(),
        format_speed(speed)
    );
    if let Some(lead) = records
        .iter()
        .find(|r| r.status == DownloadStatus::Active)
    {
        message.push_str(&format!(
            " - {} {:.1}%",
            lead.display_name(),
            lead.progress * 100.0
        ));
    }
    message
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_speed(bytes_per_sec: u64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_sec as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes_per_sec} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
