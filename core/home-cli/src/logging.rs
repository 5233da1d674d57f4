//! Logging setup.
//!
//! Logs always go to stderr so stdout stays clean JSON. With `--log-dir` a
//! daily-rolling file is written as well; the returned guard flushes it and
//! must live until the process exits.

use std::env;
use std::path::Path;

use fs_err as fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "HOME_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "home-cli.log";

pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_writer, guard) = match log_dir.and_then(file_writer) {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn filter() -> EnvFilter {
    if env::var(DEBUG_ENV).is_ok_and(|value| is_truthy(&value)) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    // Subscriber isn't up yet, so setup problems go straight to stderr.
    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("home-cli: file logging disabled: {}", err);
        return None;
    }
    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)
    {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(err) => {
            eprintln!("home-cli: file logging disabled: {}", err);
            None
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("logs/nested");
        let writer = file_writer(&dir);
        assert!(writer.is_some());
        assert!(dir.is_dir());
    }
}
