use std::fs::{self, OpenOptions};
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tracing_subscriber::filter::EnvFilter;

use crate::config::LoggingConfig;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
    /// The window owns the terminal and no file was configured.
    Off,
}

pub fn target<'a>(config: &'a LoggingConfig, window: bool) -> LogTarget<'a> {
    match &config.file {
        Some(path) => LogTarget::File(path),
        None if window => LogTarget::Off,
        None => LogTarget::Stderr,
    }
}

/// `RUST_LOG` wins, then `-D`, then the configured level.
pub fn filter(config: &LoggingConfig, debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { config.level.as_str() };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

pub fn init(config: &LoggingConfig, window: bool, debug: bool) -> Result<()> {
    let filter = filter(config, debug);
    let result = match target(config, window) {
        LogTarget::Off => return Ok(()),
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("cannot create log dir {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
    };
    result.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
