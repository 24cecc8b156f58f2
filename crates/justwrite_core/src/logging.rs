//! Logging bootstrap and draft redaction.
//!
//! # Responsibility
//! - Start the rolling file logger once per process.
//! - Keep draft text out of log files: events describe text through
//!   [`redacted`], and panic payloads have quoted values masked.
//!
//! # Invariants
//! - Re-initialization with the same level and directory is a no-op; any
//!   other combination is rejected.
//! - Initialization never panics.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "justwrite";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: LevelFilter,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

#[derive(Debug)]
pub enum LogError {
    UnsupportedLevel(String),
    /// Empty or relative log directory.
    InvalidDir(String),
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// Logging already runs with a different level or directory.
    Conflict {
        active: String,
        requested: String,
    },
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected off|error|warn|info|debug|trace"
            ),
            Self::InvalidDir(dir) => write!(f, "log_dir must be an absolute path, got `{dir}`"),
            Self::CreateDir { path, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                path.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already initialized with `{active}`; refusing to switch to `{requested}`"
            ),
        }
    }
}

impl Error for LogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            Self::UnsupportedLevel(_) | Self::InvalidDir(_) | Self::Conflict { .. } => None,
        }
    }
}

/// Initializes core logging at `level` into `log_dir` (absolute).
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LogError> {
    let level = level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| LogError::UnsupportedLevel(level.trim().to_string()))?;
    let log_dir = log_dir.trim();
    if log_dir.is_empty() || !Path::new(log_dir).is_absolute() {
        return Err(LogError::InvalidDir(log_dir.to_string()));
    }
    let log_dir = PathBuf::from(log_dir);

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, &log_dir))?;
    if state.level != level || state.log_dir != log_dir {
        return Err(LogError::Conflict {
            active: format!("{} in {}", state.level, state.log_dir.display()),
            requested: format!("{level} in {}", log_dir.display()),
        });
    }
    Ok(())
}

fn start_logger(level: LevelFilter, log_dir: &Path) -> Result<LoggingState, LogError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LogError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let logger = Logger::with(LogSpecification::builder().default(level).build())
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
        .start()
        .map_err(LogError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={} platform={} version={}",
        log_dir.display(),
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    })
}

/// Active `(level, log_dir)`, or `None` before initialization.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Log-safe description of draft text: its size, never its content.
#[derive(Debug, Clone, Copy)]
pub struct Redacted<'a>(&'a str);

pub fn redacted(text: &str) -> Redacted<'_> {
    Redacted(text)
}

impl Display for Redacted<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chars={} lines={}",
            self.0.chars().count(),
            self.0.lines().count()
        )
    }
}

// Runs only from `start_logger`, which the once-cell guards.
fn install_panic_hook() {
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
            "event=panic_captured module=logging status=error location={location} payload={}",
            mask_panic_payload(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Masks quoted values (`"..."`, `` `...` ``) that may hold draft text,
/// flattens newlines and caps the result at `max_chars`.
fn mask_panic_payload(payload: &str, max_chars: usize) -> String {
    let mut masked = String::with_capacity(payload.len().min(max_chars));
    let mut chars = payload.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' | '`' => {
                let mut hidden = 0usize;
                let mut closed = false;
                let mut escaped = false;
                for inner in chars.by_ref() {
                    if !escaped && inner == ch {
                        closed = true;
                        break;
                    }
                    escaped = !escaped && inner == '\\';
                    hidden += 1;
                }
                masked.push(ch);
                masked.push_str(&format!("<{hidden} chars>"));
                if closed {
                    masked.push(ch);
                }
            }
            '\n' | '\r' => masked.push(' '),
            other => masked.push(other),
        }
    }

    if masked.chars().count() > max_chars {
        let mut truncated = masked.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        masked
    }
}
