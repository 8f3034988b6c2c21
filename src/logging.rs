//! Logging setup
//!
//! Installs a `tracing` subscriber built from [`LoggingConfig`]. `RUST_LOG`
//! overrides the configured level. With a log directory, output goes to a
//! daily rolling file through a non-blocking writer whose guard must be kept
//! alive until shutdown.

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "input-ingress.log";

/// Initialize logging. Returns the file writer guard when logging to a
/// directory. A second call leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match &config.log_dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {:?}: {}", dir, e);
                return None;
            }
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let result = if config.json {
                registry
                    .with(fmt::layer().json().with_writer(writer))
                    .try_init()
            } else {
                registry
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_ansi(false)
                            .with_writer(writer),
                    )
                    .try_init()
            };
            if result.is_err() {
                return None;
            }
            tracing::info!("Logging to {:?} (json: {})", dir, config.json);
            Some(guard)
        }
        None => {
            let result = if config.json {
                registry
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init()
            } else {
                registry
                    .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                    .try_init()
            };
            if result.is_ok() {
                tracing::debug!("Logging to stderr (json: {})", config.json);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_dir: Some(dir.path().join("logs")),
            ..Default::default()
        };
        // Another test may already own the global subscriber.
        let guard = init_logging(&config);
        assert!(dir.path().join("logs").exists());
        drop(guard);
    }
}
