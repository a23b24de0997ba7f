use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "CONSOLEFOLD_LOG";
pub const LOG_PATH_ENV: &str = "CONSOLEFOLD_LOG_PATH";
const DEFAULT_LOG_PATH: &str = "/tmp/consolefold.log";
const DEFAULT_FILTER: &str = "warn,consolefold=info";

/// Where diagnostics end up once `init_tracing` has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Installs the global fmt subscriber. The terminal front end owns stdout,
/// so output goes to a file whenever stderr is an interactive terminal.
pub fn init_tracing() -> Result<LogTarget> {
    let filter = resolve_filter();
    let target = resolve_log_path()
        .map(LogTarget::File)
        .unwrap_or(LogTarget::Stderr);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match &target {
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|error| anyhow::anyhow!("failed to install tracing subscriber: {error}"))?;
    Ok(target)
}

fn resolve_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn resolve_log_path() -> Option<PathBuf> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
        .map(PathBuf::from)
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_PATH_ENV, " /tmp/consolefold-test.log ");
        assert_eq!(
            resolve_log_path(),
            Some(PathBuf::from("/tmp/consolefold-test.log"))
        );
        std::env::remove_var(LOG_PATH_ENV);
    }

    #[test]
    fn test_open_log_file_appends() {
        use std::io::{Read, Write};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consolefold.log");

        open_log_file(&path).unwrap().write_all(b"first\n").unwrap();
        open_log_file(&path).unwrap().write_all(b"second\n").unwrap();

        let mut contents = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("consolefold.log");
        let err = open_log_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
