use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive and writes the closing marker
/// when the process winds down.
pub struct LogGuard {
    _worker: WorkerGuard,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::info!("=== Logging ended ===");
    }
}

/// Log to stdout and to `logs/voxbridge_YYYYMMDD_HHMMSS.log`. `RUST_LOG`
/// overrides the level derived from `--log-level`.
pub fn init(log_level: i32) -> anyhow::Result<LogGuard> {
    std::fs::create_dir_all("logs")?;

    let filename = format!(
        "voxbridge_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let appender = tracing_appender::rolling::never("logs", filename);
    let (non_blocking, worker) = tracing_appender::non_blocking(appender);

    let default_level = match log_level {
        i32::MIN..=-1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(io::stdout.and(non_blocking))
        .with_env_filter(filter)
        .init();

    tracing::info!("=== Logging started ===");
    Ok(LogGuard { _worker: worker })
}
