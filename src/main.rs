//! CLI entry point for superdownload.

use anyhow::Result;
use clap::Parser;
use superdownload_core::paths::default_state_dir;
use tracing::{debug, warn};

mod app;
mod cli;
mod commands;

use app::terminal::{default_log_level, init_tracing, open_log_file};
use cli::{Args, Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let command = args.resolve_command().unwrap_or_else(|error| error.exit());
    let state_dir = args.state_dir.clone().unwrap_or_else(default_state_dir);

    // Only long-running sessions keep a log file next to the history.
    let (log_file, log_file_error) = if matches!(command, Command::Run(_)) {
        match open_log_file(&state_dir) {
            Ok(file) => (Some(file), None),
            Err(error) => (None, Some(error)),
        }
    } else {
        (None, None)
    };
    init_tracing(default_log_level(args.quiet, args.verbose), log_file);
    if let Some(error) = log_file_error {
        warn!(dir = %state_dir.display(), error = %error, "Could not open log file; logging to stderr only");
    }

    debug!(?command, state_dir = %state_dir.display(), "CLI arguments parsed");

    match &command {
        Command::Run(run) => commands::run_download_command(&args, run, &state_dir).await,
        Command::List(list) => commands::run_list_command(&state_dir, list.json),
        Command::Config(ConfigCommand::Show) => commands::run_config_show_command(&state_dir),
        Command::Config(ConfigCommand::Set(set)) => {
            commands::run_config_set_command(&state_dir, set)
        }
    }
}
