//! Size-based rotation for the daily log files under `.flotilla/logs/`.
//!
//! A log over [`MAX_LOG_BYTES`] is shifted to `<name>.1`, older copies move
//! up by one, and at most [`MAX_ROTATED_FILES`] copies are kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 100 MiB.
pub const MAX_LOG_BYTES: u64 = 100 * 1024 * 1024;

pub const MAX_ROTATED_FILES: usize = 30;

/// Rotate `log_path` if it is at least `max_bytes` long.
///
/// Returns `true` if rotation occurred. A missing file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("flotilla.log");
    base.with_file_name(format!("{name}.{n}"))
}
