//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand};

use superdownload_core::Theme;
use superdownload_core::rpc::constants::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};

/// Default reconciliation interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Queue downloads on an aria2 daemon and watch them finish.
///
/// Downloads are tracked in a persisted history and reconciled with the
/// daemon every second. Without a reachable daemon the queue still works in
/// a degraded mode so nothing you add is lost.
///
/// `superdownload URL...` is shorthand for `superdownload run URL...`; put
/// global options before the URLs.
#[derive(Parser, Debug)]
#[command(name = "superdownload")]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Invocation>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding history.json, config.json and log.txt
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Daemon RPC host, including scheme
    #[arg(long, global = true, default_value = DEFAULT_RPC_HOST)]
    pub rpc_host: String,

    /// Daemon RPC port
    #[arg(long, global = true, default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Daemon RPC secret token
    #[arg(long, global = true)]
    pub rpc_secret: Option<String>,

    /// Milliseconds between reconciliation polls (50-60000)
    #[arg(long, global = true, default_value_t = DEFAULT_POLL_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(50..=60000))]
    pub poll_interval_ms: u64,
}

impl Args {
    /// The subcommand to run. No subcommand, or bare URLs, mean `run`.
    ///
    /// # Errors
    ///
    /// A bare first word that cannot be a URL (e.g. a misspelt subcommand)
    /// is reported as an unrecognized subcommand.
    pub fn resolve_command(&self) -> Result<Command, clap::Error> {
        match &self.command {
            None => Ok(Command::Run(RunArgs::default())),
            Some(Invocation::Named(command)) => Ok(command.clone()),
            Some(Invocation::Urls(tokens)) => {
                if let Some(first) = tokens.first()
                    && is_bare_word(first)
                {
                    return Err(Self::command().error(
                        ErrorKind::InvalidSubcommand,
                        format!("unrecognized subcommand '{first}'"),
                    ));
                }
                Ok(Command::Run(RunArgs::from_bare(tokens)))
            }
        }
    }
}

/// What was typed after the global options.
#[derive(Subcommand, Debug, Clone)]
pub enum Invocation {
    #[command(flatten)]
    Named(Command),

    /// Bare URLs, shorthand for `run`
    #[command(external_subcommand)]
    Urls(Vec<String>),
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Queue URLs (if any) and watch the queue until nothing is in flight
    Run(RunArgs),

    /// Print the persisted download history
    List(ListArgs),

    /// Show or change the saved configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    /// URLs to download (http, https, ftp or sftp)
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Keep watching after the queue drains (exit with Ctrl-C)
    #[arg(long)]
    pub keep_running: bool,
}

impl RunArgs {
    /// Builds `run` arguments from a bare `URL... [--keep-running]` tail.
    fn from_bare(tokens: &[String]) -> Self {
        let mut run = Self::default();
        for token in tokens {
            if token == "--keep-running" {
                run.keep_running = true;
            } else {
                run.urls.push(token.clone());
            }
        }
        run
    }
}

/// Subcommand-like words: letters, digits and dashes only.
fn is_bare_word(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print the history as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Change one or more settings; others keep their current value
    Set(ConfigSetArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ConfigSetArgs {
    /// Directory new downloads are saved to
    #[arg(long, value_name = "DIR")]
    pub default_path: Option<PathBuf>,

    /// Maximum concurrent transfers on the daemon (1-16)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16))]
    pub max_concurrent: Option<u32>,

    /// Global download limit in bytes per second (0 for unlimited)
    #[arg(long)]
    pub max_global_speed: Option<u64>,

    /// Preferred theme
    #[arg(long, value_parser = parse_theme)]
    pub theme: Option<Theme>,
}

impl ConfigSetArgs {
    /// Returns true when no setting was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.default_path.is_none()
            && self.max_concurrent.is_none()
            && self.max_global_speed.is_none()
            && self.theme.is_none()
    }
}

fn parse_theme(value: &str) -> Result<Theme, String> {
    value.parse()
}
