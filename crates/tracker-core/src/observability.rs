//! Logging initialization shared by binaries and tests.
//!
//! Structured JSON logs in production, pretty logs for development. The
//! default level comes from the caller (typically the `LOG_LEVEL`
//! environment variable); `RUST_LOG` still takes precedence when set.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    #[default]
    Json,
    /// Pretty-printed logs (for development).
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at process startup. Safe to call multiple times; subsequent
/// calls are no-ops.
pub fn init_logging(format: LogFormat, default_level: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}
