//! Tracing setup shared by the CLI and the daemon

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "WORKBENCH_LOG";
/// CLI default: only warnings, such as skipped providers
pub const DEFAULT_FILTER: &str = "warn";
/// Daemon default; `workbench` also matches the `workbench_*` crate targets
pub const DAEMON_FILTER: &str = "warn,workbench=info";
/// Prefix of the daemon's rolling log files
pub const DAEMON_LOG_FILE: &str = "daemon.log";

static INIT: Once = Once::new();
static FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Directory for the daily rolling log file; stderr only when `None`
    pub log_dir: Option<PathBuf>,
    /// Filter used when neither `WORKBENCH_LOG` nor `RUST_LOG` is set
    pub default_filter: Option<String>,
}

impl LoggingOptions {
    pub fn stderr() -> Self {
        Self::default()
    }

    pub fn daemon(log_dir: &Path) -> Self {
        Self {
            log_dir: Some(log_dir.to_path_buf()),
            default_filter: Some(DAEMON_FILTER.to_string()),
        }
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = Some(filter.into());
        self
    }

    /// Filter applied when no environment variable overrides it
    pub fn fallback_filter(&self) -> &str {
        self.default_filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber; later calls are no-ops
pub fn init(options: LoggingOptions) {
    INIT.call_once(|| {
        let filter = build_filter(options.fallback_filter());
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

        let mut file_error = None;
        let file_layer = options.log_dir.as_ref().and_then(|dir| {
            if let Err(e) = std::fs::create_dir_all(dir) {
                file_error = Some(format!("log dir init failed for {}: {}", dir.display(), e));
                return None;
            }
            let appender = tracing_appender::rolling::daily(dir, DAEMON_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if let Ok(mut slot) = FILE_GUARD.lock() {
                *slot = Some(guard);
            }
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        });

        let installed = Registry::default()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init();

        if installed.is_ok() {
            if let Some(error) = file_error {
                tracing::warn!("{error}");
            }
        }
    });
}

/// Flush buffered file output; call before the process exits
pub fn flush() {
    if let Ok(mut slot) = FILE_GUARD.lock() {
        slot.take();
    }
}
