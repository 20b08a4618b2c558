//! CLI command handlers.

mod config;
mod list;
mod run;

pub use config::{run_config_set_command, run_config_show_command};
pub use list::run_list_command;
pub use run::run_download_command;
