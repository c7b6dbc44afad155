//! Tracing subscriber setup.

use crate::config::LoggingSection;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Overrides the configured level with a full filter directive
pub const LOG_ENV: &str = "TUJALI_LOG";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown names fall back to `Pretty`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Default directive when `TUJALI_LOG` is unset
pub fn default_directive(level: &str) -> String {
    let level = match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    };
    format!("{level},tower_http=debug,hyper=warn")
}

/// Install the global subscriber; later calls are ignored
pub fn init(config: &LoggingSection) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));
    let format = LogFormat::parse(&config.format);

    let layer = match format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    let _ = tracing_subscriber::registry().with(env_filter).with(layer).try_init();

    tracing::info!("Logging initialized");
    tracing::debug!(level = %config.level, ?format, "Logging configuration");
}
