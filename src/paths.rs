//! Resolution of per-user state and download directories.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Directory name used under the XDG state home.
pub const APP_DIR_NAME: &str = "superdownload";

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Resolves the directory holding `history.json`, `config.json` and `log.txt`.
///
/// Priority:
/// 1. `$XDG_STATE_HOME/superdownload`
/// 2. `$HOME/.local/state/superdownload`
/// 3. `./.superdownload` when neither is set
#[must_use]
pub fn default_state_dir() -> PathBuf {
    if let Some(state_home) = env_var_non_empty_os("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR_NAME);
    }
    if let Some(home) = env_var_non_empty_os("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR_NAME);
    }
    PathBuf::from(format!(".{APP_DIR_NAME}"))
}

/// Default destination for new downloads: `$HOME/Downloads`, else `.`.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    env_var_non_empty_os("HOME").map_or_else(
        || PathBuf::from("."),
        |home| PathBuf::from(home).join("Downloads"),
    )
}
