//! pin-comments: pinned page comments from the command line.
//!
//! Entry point for the `pin-comments` binary. Startup runs in a fixed order:
//!
//! 1. Install the tracing subscriber (stderr, `PIN_COMMENTS_LOG`, default `warn`).
//! 2. Merge CLI flags over `$XDG_CONFIG_HOME/pin-comments/config.toml`.
//! 3. Open the WAL-mode cache database under the resolved prefix.
//! 4. Resolve options against what a previous setup persisted.
//! 5. Hand off to the subcommand, which hydrates the store when it needs one.

mod cli;
mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pin_comments_core::cache::LocalCache;
use pin_comments_core::config::Options;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "PIN_COMMENTS_LOG";

/// Base directory from `var`, falling back to `$HOME/<home_rel>`.
fn xdg_dir(var: &str, home_rel: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(home_rel)))
        .unwrap_or_else(|| PathBuf::from(home_rel))
}

/// Returns the path to the config file.
///
/// Prefers `$XDG_CONFIG_HOME/pin-comments/config.toml`; falls back to
/// `~/.config/pin-comments/config.toml` when the env var is absent.
fn config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("pin-comments").join("config.toml")
}

fn default_db_path() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share").join("pin-comments").join("cache.db")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = cli::Cli::parse();

    let path = config_path();
    let file_options = Options::load(&path)
        .with_context(|| format!("reading {}", path.display()))?
        .unwrap_or_default();
    let options = cli.options().or(file_options);

    let db_path = options.db_path.clone().unwrap_or_else(default_db_path);
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let cache = LocalCache::open(&db_path, options.prefix())
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;

    let session = commands::Session::new(cache, &options, cli.page).await?;
    commands::run(&session, cli.command).await
}
