//! Logging system initialization
//!
//! The command-line tool logs to `<data dir>/getexeicon/getexeicon.log`. Each
//! start shifts the previous session logs one slot down (`getexeicon.log.1` is
//! the most recent) and keeps at most [`MAX_LOG_FILES`] of them.

use crate::error::{IconError, Result, StringError};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt};

/// Maximum number of previous session logs kept next to the current one
pub const MAX_LOG_FILES: u8 = 9;

const LOG_PREFIX: &str = "getexeicon";
const LOG_SUFFIX: &str = "log";

/// Path of the current session log inside `log_dir`
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("{LOG_PREFIX}.{LOG_SUFFIX}"))
}

/// Initialize the global subscriber, writing to a log file in `log_dir`
///
/// `default_directive` applies when `RUST_LOG` is unset or invalid.
pub fn init_logging(log_dir: &Path, default_directive: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    rotate_logs_on_startup(&log_file_path(log_dir))?;

    // Rotation happens per session above, never by time
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .build(log_dir)
        .map_err(|e| IconError::Config(Box::new(e)))?;

    let subscriber = fmt()
        .with_writer(file_appender)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| IconError::Config(Box::new(e)))?;

    tracing::info!("getexeicon v{} started", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Shift `name.log` to `name.log.1`, `name.log.1` to `name.log.2` and so on
///
/// The log in slot [`MAX_LOG_FILES`] is deleted. Gaps in the history are kept
/// as gaps. Nothing happens if there is no current log.
fn rotate_logs_on_startup(log_path: &Path) -> Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let (Some(log_dir), Some(log_name)) = (log_path.parent(), log_path.file_name()) else {
        return Err(IconError::Config(StringError::new(format!(
            "Invalid log path: {}",
            log_path.display()
        ))));
    };
    let log_name = log_name.to_string_lossy();
    let numbered = |slot: u8| log_dir.join(format!("{log_name}.{slot}"));

    let oldest = numbered(MAX_LOG_FILES);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }

    for slot in (1..MAX_LOG_FILES).rev() {
        let current = numbered(slot);
        if current.exists() {
            std::fs::rename(&current, numbered(slot + 1))?;
        }
    }

    std::fs::rename(log_path, numbered(1))?;
    Ok(())
}
