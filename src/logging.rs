//! Logging setup for feedrelay.
//!
//! Console output is colored; the log file gets the same events without ANSI
//! codes and is appended to across restarts. `RUST_LOG`, when set, replaces
//! the configured level and dependency directives entirely.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{RelayError, Result};

/// Dependencies that are chatty below `warn`.
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "reqwest=warn",
    "rustls=warn",
];

/// Level named in the config; unknown names mean `info`.
fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Filter directives for `level`, unless `env_override` supplies its own.
fn filter_directives(level: &str, env_override: Option<&str>) -> String {
    if let Some(directives) = env_override.map(str::trim).filter(|d| !d.is_empty()) {
        return directives.to_string();
    }
    std::iter::once(parse_level(level).to_string())
        .chain(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: &str) -> EnvFilter {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    EnvFilter::new(filter_directives(level, env.as_deref()))
}

/// Open `path` for appending, creating it and its directory if needed.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Log to stdout and to the configured file.
///
/// Fails if the file cannot be opened or a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = open_log_file(Path::new(&config.file))?;

    let console = fmt::layer().with_target(true);
    let file = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| RelayError::Config(format!("cannot install logger: {}", e)))
}

/// Log to stdout only. Does nothing if a subscriber is already set.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Route panics through tracing before the default hook runs.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("uncaught panic: {}", info);
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), LevelFilter::TRACE);
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" Info "), LevelFilter::INFO);
        assert_eq!(parse_level("warning"), LevelFilter::WARN);
        assert_eq!(parse_level("error"), LevelFilter::ERROR);
        assert_eq!(parse_level("off"), LevelFilter::OFF);
    }

    #[test]
    fn test_parse_level_unknown_is_info() {
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
        assert_eq!(parse_level(""), LevelFilter::INFO);
        assert_eq!(parse_level("3"), LevelFilter::INFO);
    }

    #[test]
    fn test_directives_quiet_dependencies() {
        let directives = filter_directives("debug", None).to_lowercase();
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn test_env_directives_take_precedence() {
        assert_eq!(
            filter_directives("debug", Some("feedrelay=trace")),
            "feedrelay=trace"
        );
        assert!(filter_directives("error", Some("  ")).starts_with("error"));
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/nested/feedrelay.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedrelay.log");
        fs::write(&path, "previous run\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"this run\n").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "previous run\nthis run\n"
        );
    }
}
