//! `tracing-subscriber` setup for the server binary.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingSettings};

/// Builds the filter: `RUST_LOG` if set, else the configured directive,
/// else `info`.
pub fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Call once, at startup.
pub fn init(settings: &LoggingSettings) {
    let filter = filter(settings);
    match settings.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
