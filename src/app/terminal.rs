//! Terminal detection and tracing setup.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Log file written next to the history during `run`.
pub(crate) const LOG_FILE: &str = "log.txt";

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Maps `-q` / `-v` counts to a default filter level.
pub(crate) fn default_log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Opens `<state_dir>/log.txt` for appending, creating the directory.
pub(crate) fn open_log_file(state_dir: &Path) -> io::Result<File> {
    fs::create_dir_all(state_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(state_dir.join(LOG_FILE))
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// With a log file, events go to both stderr and the file, without ANSI
/// colors so the file stays readable.
pub(crate) fn init_tracing(default_level: &str, log_file: Option<File>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    match log_file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_writer(io::stderr.and(Mutex::new(file)))
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_env_filter(filter)
                .try_init();
        }
    }
}
