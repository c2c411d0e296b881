use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log to a daily file under `~/.aries/logs`, named after `component`, and
/// optionally to stderr. Keep the guard alive until exit or buffered lines
/// are lost.
pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    let log_dir = crate::config::aries_home().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);

    // e.g. cli.log.2026-10-19
    let file_appender = tracing_appender::rolling::daily(&log_dir, format!("{component}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        let _ = registry.with(stderr_layer).try_init();
    } else {
        let _ = registry.try_init();
    }

    guard
}
