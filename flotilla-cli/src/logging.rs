//! Tracing setup.
//!
//! Inside a workspace, every run appends JSON lines to
//! `.flotilla/logs/flotilla-YYYY-MM-DD.log`. `--verbose` adds a human
//! readable layer on stderr. `RUST_LOG` overrides both levels.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use flotilla_core::workspace;

use crate::rotation::{rotate_if_needed, MAX_LOG_BYTES, MAX_ROTATED_FILES};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Today's log file for the workspace at `root`.
pub fn log_path(root: &Path) -> PathBuf {
    let day = chrono::Local::now().format("%Y-%m-%d");
    workspace::logs_dir(root).join(format!("flotilla-{day}.log"))
}

pub fn init_tracing(root: Option<&Path>, verbose: bool) -> Result<()> {
    let file_layer = match root {
        Some(root) => {
            let path = log_path(root);
            let dir = workspace::logs_dir(root);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            if let Err(err) = rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
                eprintln!("warning: log rotation failed for {}: {err}", path.display());
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_filter(filter("info")),
            )
        }
        None => None,
    };

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter("debug"))
    });

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Ok(())
}
