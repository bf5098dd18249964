/// File logging. The terminal belongs to the TUI, so everything goes to
/// `<data_dir>/genie.log`. Filter with `GENIE_LOG` (default `info`).
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "genie.log";
pub const LOG_ENV: &str = "GENIE_LOG";

/// Install the global subscriber. Keep the guard alive until exit or the
/// tail of the log is lost.
pub fn init(data_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(data_dir)
        .with_context(|| format!("Failed to open {}", data_dir.join(LOG_FILE).display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopenable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(LOG_FILE)).unwrap();
        let err = init(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains(LOG_FILE));
    }

    #[test]
    fn test_unwritable_data_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        assert!(init(&blocker.join("genie")).is_err());
    }
}
