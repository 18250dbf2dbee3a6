//! Tracing subscriber setup for the node binary

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter from `RUST_LOG` when set, otherwise from the configured level
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize the logging system
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(config.thread_ids)
        .with_level(true);

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(fmt_layer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_to_configured_level() {
        let config = LoggingConfig {
            level: "medchain=debug,miner=trace".to_string(),
            thread_ids: false,
        };
        // RUST_LOG may be set in the environment running the tests
        if std::env::var_os("RUST_LOG").is_none() {
            let filter = build_filter(&config).to_string();
            assert!(filter.contains("miner=trace"));
        }
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
