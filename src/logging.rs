//! Diagnostic logging setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "nasmon=info";

/// Install the global tracing subscriber.
///
/// With a log file everything goes there. Otherwise logs go to stderr,
/// except in TUI mode where they would corrupt the screen and are dropped.
pub fn init(log_file: Option<&Path>, tui_mode: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    } else if tui_mode {
        return Ok(());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}
