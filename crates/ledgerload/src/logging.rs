//! Logging setup for the binary.
//!
//! Two layers share one registry: a daily rolling file under the logs
//! directory and a console layer on stderr. stdout stays free for command
//! output so `--json` can be piped.

use ledgerload::config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "ledgerload=info,ledgerload_db=info";
const VERBOSE_FILTER: &str = "ledgerload=debug,ledgerload_db=debug";
const LOG_FILE_PREFIX: &str = "ledgerload.log";

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = config::logs_dir();
    let mut guard = None;
    let file_layer = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter(verbose)),
            )
        }
        Err(err) => {
            eprintln!(
                "Warning: failed to create logs directory {}: {}",
                log_dir.display(),
                err
            );
            None
        }
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(verbose));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
