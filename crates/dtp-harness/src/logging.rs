//! Structured logging setup.
//!
//! The engine only emits `tracing` events; this module installs the
//! subscriber. Terminal output is pretty, compact or JSON; an optional
//! JSON-lines file receives every event as well, for post-hoc analysis with
//! `jq` or similar tools.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dtp_core::report::{SearchOutcome, SearchReport};
use dtp_error::{PollutionError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name of the JSON-lines log written under [`LoggingConfig::log_dir`].
pub const LOG_FILE_NAME: &str = "search.log.jsonl";

/// Terminal output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutputFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
    /// Single-line human-readable output.
    Compact,
}

impl fmt::Display for LogOutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for LogOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogOutputFormat,
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level_filter: String,
    /// Whether to include module paths in terminal output.
    pub include_targets: bool,
    /// Directory for the JSON-lines log file; `None` disables file output.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogOutputFormat::Pretty,
            level_filter: "info".to_owned(),
            include_targets: true,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// JSON output at info level, for CI logs.
    #[must_use]
    pub fn ci() -> Self {
        Self {
            format: LogOutputFormat::Json,
            ..Self::default()
        }
    }

    /// Compact, quiet output for tests.
    #[must_use]
    pub fn test() -> Self {
        Self {
            format: LogOutputFormat::Compact,
            level_filter: "warn".to_owned(),
            include_targets: false,
            log_dir: None,
        }
    }

    /// Default configuration with `DTP_LOG_FORMAT`, `DTP_LOG_LEVEL` and
    /// `DTP_LOG_DIR` applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(format) = lookup("DTP_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.format = format;
        }
        if let Some(level) = lookup("DTP_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.level_filter = level;
        }
        if let Some(dir) = lookup("DTP_LOG_DIR").filter(|v| !v.trim().is_empty()) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

/// Returned by [`init_logging`]. Keep it alive for the life of the program.
#[derive(Debug)]
pub struct LogGuard {
    /// Path of the JSON-lines log file, when file output is enabled.
    pub log_path: Option<PathBuf>,
}

/// A `MakeWriter` that serializes writes to one shared file.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl SharedFileWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            guard: self.file.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

struct SharedFileGuard<'a> {
    guard: MutexGuard<'a, std::fs::File>,
}

impl std::io::Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut *self.guard, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut *self.guard)
    }
}

fn open_log_file(dir: &Path) -> Result<(PathBuf, SharedFileWriter)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = std::fs::File::create(&path)?;
    Ok((path, SharedFileWriter::new(file)))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an I/O error if the log directory or file cannot be created, and
/// [`PollutionError::Internal`] if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level_filter));

    let (log_path, file_writer) = match &config.log_dir {
        Some(dir) => {
            let (path, writer) = open_log_file(dir)?;
            (Some(path), Some(writer))
        }
        None => (None, None),
    };

    let targets = config.include_targets;
    let pretty = (config.format == LogOutputFormat::Pretty)
        .then(|| tracing_subscriber::fmt::layer().pretty().with_target(targets));
    let compact = (config.format == LogOutputFormat::Compact)
        .then(|| tracing_subscriber::fmt::layer().compact().with_target(targets));
    let json = (config.format == LogOutputFormat::Json)
        .then(|| tracing_subscriber::fmt::layer().json().with_target(targets));
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(compact)
        .with(json)
        .with(file_layer)
        .try_init()
        .map_err(|error| PollutionError::internal(format!("tracing subscriber: {error}")))?;

    tracing::info!(
        format = %config.format,
        level = %config.level_filter,
        log_path = ?log_path,
        "logging initialized"
    );
    Ok(LogGuard { log_path })
}

/// Initialize logging for tests: compact, captured by the test harness.
///
/// Safe to call from every test; only the first call installs a
/// subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}

/// Emit one completion event summarizing a finished search.
pub fn log_search_report(report: &SearchReport) {
    match &report.outcome {
        SearchOutcome::Culprit {
            failing_test,
            culprit,
            confirmed_by,
        } => tracing::info!(
            report_id = %report.report_id,
            mode = %report.mode,
            failing_test = %failing_test,
            culprit = %culprit,
            ?confirmed_by,
            evaluations = report.evaluations.len(),
            "search complete"
        ),
        SearchOutcome::FailingOrder {
            run, failing_test, ..
        } => tracing::info!(
            report_id = %report.report_id,
            mode = %report.mode,
            run,
            failing_test = %failing_test,
            evaluations = report.evaluations.len(),
            "failing ordering found"
        ),
        SearchOutcome::Failed { kind, message, .. } => tracing::warn!(
            report_id = %report.report_id,
            mode = %report.mode,
            kind = %kind,
            error = %message,
            evaluations = report.evaluations.len(),
            "search stopped"
        ),
    }
}
