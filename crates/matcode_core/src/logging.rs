//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start the rotating `matcode` file log once per process.
//! - Capture panics as sanitized log events.
//!
//! # Invariants
//! - Repeated init with the same level and directory is a no-op.
//! - Init with a different level or directory fails with `AlreadyInitialized`.
//! - Log lines carry metadata only; record content never reaches the log.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "matcode";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Logging bootstrap failure.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    /// Log directory is empty or relative.
    InvalidDirectory(String),
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Logging runs with another configuration.
    AlreadyInitialized {
        level: &'static str,
        log_dir: PathBuf,
    },
    Backend(flexi_logger::FlexiLoggerError),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(path) => {
                write!(f, "log directory must be a non-empty absolute path, got `{path}`")
            }
            Self::CreateDirectory { path, source } => {
                write!(f, "failed to create log directory `{}`: {source}", path.display())
            }
            Self::AlreadyInitialized { level, log_dir } => write!(
                f,
                "logging already initialized with level `{level}` at `{}`",
                log_dir.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<flexi_logger::FlexiLoggerError> for LoggingError {
    fn from(value: flexi_logger::FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Starts file logging under `log_dir` at `level`.
///
/// # Errors
/// - `UnsupportedLevel` / `InvalidDirectory` for bad arguments.
/// - `AlreadyInitialized` when a different configuration is active.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    let log_dir = normalize_log_dir(log_dir.as_ref())?;

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, &log_dir))?;
    if state.level != level || state.log_dir != log_dir {
        return Err(LoggingError::AlreadyInitialized {
            level: state.level,
            log_dir: state.log_dir.clone(),
        });
    }
    Ok(())
}

/// Active `(level, log_dir)`, or `None` before init.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, log_dir: &Path) -> Result<LoggingState, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let logger = Logger::try_with_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook_once();
    info!(
        "event=logging_init module=core status=ok level={level} build_mode={} version={}",
        if cfg!(debug_assertions) { "debug" } else { "release" },
        env!("CARGO_PKG_VERSION")
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn normalize_log_dir(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    if log_dir.as_os_str().is_empty() || !log_dir.is_absolute() {
        return Err(LoggingError::InvalidDirectory(
            log_dir.display().to_string(),
        ));
    }
    Ok(log_dir.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=core status=error location={location} payload={}",
            sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Flattens line breaks and caps length at `max_chars`.
fn sanitize_message(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, normalize_level, normalize_log_dir, sanitize_message,
        LoggingError,
    };
    use std::path::Path;

    #[test]
    fn level_aliases_normalize() {
        assert_eq!(normalize_level(" WARNING ").expect("alias"), "warn");
        assert!(matches!(
            normalize_level("verbose"),
            Err(LoggingError::UnsupportedLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        assert!(matches!(
            normalize_log_dir(Path::new("logs/dev")),
            Err(LoggingError::InvalidDirectory(_))
        ));
        assert!(normalize_log_dir(Path::new("")).is_err());
    }

    #[test]
    fn sanitize_flattens_and_caps() {
        assert_eq!(sanitize_message("a\nb", 10), "a b");
        assert_eq!(sanitize_message("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn repeated_init_is_idempotent_and_conflicts_fail() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");

        init_logging("info", first.path()).expect("first init");
        init_logging("INFO", first.path()).expect("same config is a no-op");
        assert!(matches!(
            init_logging("debug", first.path()),
            Err(LoggingError::AlreadyInitialized { level: "info", .. })
        ));
        assert!(matches!(
            init_logging("info", second.path()),
            Err(LoggingError::AlreadyInitialized { .. })
        ));

        let (level, dir) = logging_status().expect("active");
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
