//! Config command handlers: show and change the saved configuration.

use std::path::Path;

use anyhow::{Context, Result, bail};
use superdownload_core::{AppConfig, ConfigPatch, PersistenceStore};
use tracing::info;

use crate::cli::ConfigSetArgs;

pub fn run_config_show_command(state_dir: &Path) -> Result<()> {
    let store = PersistenceStore::open(state_dir);
    print_config(store.config())
}

pub fn run_config_set_command(state_dir: &Path, args: &ConfigSetArgs) -> Result<()> {
    if args.is_empty() {
        bail!(
            "Nothing to change.\n  \
             Pass at least one of --default-path, --max-concurrent, --max-global-speed, --theme"
        );
    }
    let mut store = PersistenceStore::open(state_dir);
    let saved = store
        .save_config(&patch_from_args(args))
        .with_context(|| format!("failed to save {}", store.config_path().display()))?;
    info!(path = %store.config_path().display(), "Configuration saved");
    print_config(&saved)
}

fn patch_from_args(args: &ConfigSetArgs) -> ConfigPatch {
    ConfigPatch {
        default_path: args.default_path.clone(),
        max_concurrent: args.max_concurrent,
        max_global_speed: args.max_global_speed,
        theme: args.theme,
    }
}

fn print_config(config: &AppConfig) -> Result<()> {
    let encoded = serde_json::to_string_pretty(config).context("failed to encode configuration")?;
    println!("{encoded}");
    Ok(())
}
