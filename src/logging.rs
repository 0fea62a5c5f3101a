//! Logging bootstrap for the binaries: `tracing` subscriber with env
//! filter, `log`-macro bridge, and daily-rotated file output under
//! `~/.alex/logs/`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize logging.  Returns the appender guard, which must be held for
/// the life of the process so buffered log lines are flushed.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    // Route `log` macros into tracing.
    let _ = tracing_log::LogTracer::init();

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("alex={default_level},warn")));

    let log_dir = dirs::home_dir().map(|home| home.join(".alex").join("logs"));
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "alex.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                return None; // already initialized (tests)
            }
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            None
        }
    }
}
