use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{Error, Result};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const LOG_FILE_PREFIX: &str = "soundscape.log";

/// Sets up stderr logging and, if configured, a daily log file. The returned
/// guard flushes the file writer when dropped, so keep it for the app's
/// lifetime.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false);

    let (file_layer, guard) = if config.file_output {
        let (writer, guard) = file_writer(config)?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        started = %chrono::Local::now().format(TIME_FORMAT),
        level = %config.level,
        "logging initialized"
    );
    if config.file_output {
        tracing::info!(directory = ?config.directory, "writing log files");
    }
    Ok(guard)
}

fn file_writer(config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&config.directory)?;
    let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_writes_through_the_background_worker() {
        let directory =
            std::env::temp_dir().join(format!("soundscape-logs-{}", std::process::id()));
        let config = LogConfig {
            file_output: true,
            directory: directory.clone(),
            ..Default::default()
        };

        let (writer, guard) = file_writer(&config).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(writer).with_ansi(false));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("track loaded");
        });
        // the guard flushes pending lines on drop
        drop(guard);

        let contents: String = std::fs::read_dir(&directory)
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("track loaded"));
        std::fs::remove_dir_all(&directory).ok();
    }
}
