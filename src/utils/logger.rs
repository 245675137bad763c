// Tracing subscriber setup

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub const DEFAULT_FILTER: &str = "datachat=debug,tower_http=debug,axum=debug";
const LOG_FILE_PREFIX: &str = "datachat.log";

/// Install the global subscriber: console output always, plus a daily rolling
/// file when `log_dir` is set. Keep the returned guard alive for the life of
/// the process or buffered file lines are lost.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        // A subscriber already exists (tests, embedding); keep it
        return None;
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_second_init_is_harmless() {
        let config = LoggingConfig { log_dir: None };
        let _first = init_tracing(&config);
        assert!(init_tracing(&config).is_none());
    }
}
