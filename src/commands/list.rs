//! `list`: print the persisted download history.

use std::path::Path;

use anyhow::{Context, Result};
use superdownload_core::{DownloadRecord, PersistenceStore};

/// Printed when the history is empty.
pub(crate) const EMPTY_HISTORY_MESSAGE: &str = "No downloads recorded.";

pub fn run_list_command(state_dir: &Path, json: bool) -> Result<()> {
    let store = PersistenceStore::open(state_dir);
    let records = store.history();

    if json {
        let encoded =
            serde_json::to_string_pretty(records).context("failed to encode download history")?;
        println!("{encoded}");
        return Ok(());
    }

    if records.is_empty() {
        println!("{EMPTY_HISTORY_MESSAGE}");
        return Ok(());
    }
    for record in records {
        println!("{}", format_record_line(record));
    }
    Ok(())
}

/// `id[..8]  status  pct%  name`
pub(crate) fn format_record_line(record: &DownloadRecord) -> String {
    let short_id: String = record.id.chars().take(8).collect();
    format!(
        "{short_id}  {:<10}  {:>3.0}%  {}",
        record.status.as_str(),
        record.progress * 100.0,
        record.display_name()
    )
}
