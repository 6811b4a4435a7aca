//! Logging setup
//!
//! Installs a `tracing-subscriber` registry. `RUST_LOG` wins over the
//! configured level. Output is pretty in debug builds and JSON in release
//! builds unless JSON is requested explicitly.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
    Pretty,
    Json,
}

fn filter_for(log_level: &str) -> EnvFilter {
    let default_filter = format!("{},ensemble_engine={}", log_level, log_level);
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialize the subscriber with `log_level`
///
/// Only the first call in a process takes effect.
pub fn init_telemetry_with_level(log_level: &str, format: LogFormat) {
    let json = match format {
        LogFormat::Json => true,
        LogFormat::Pretty => false,
        LogFormat::Auto => !cfg!(debug_assertions),
    };

    let registry = tracing_subscriber::registry().with(filter_for(log_level));
    let result = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Initialize the subscriber at "info"
pub fn init_telemetry() {
    init_telemetry_with_level("info", LogFormat::Auto);
}
