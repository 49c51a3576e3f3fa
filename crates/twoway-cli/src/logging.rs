//! Logging setup for the CLI
//!
//! Logs go to stderr so rendered SQL on stdout stays pipeable. `RUST_LOG`
//! takes precedence over the default filter.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl LoggingConfig {
    /// Warnings only, unless `verbose` asks for engine debug output
    pub fn new(verbose: bool, json: bool) -> Self {
        let default_filter = if verbose {
            "info,twoway_templates=debug,twoway_core=debug,twoway=debug"
        } else {
            "warn"
        };
        Self {
            json,
            default_filter: default_filter.to_string(),
        }
    }
}

/// Initialize the global subscriber
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let layer = if config.json {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .compact()
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    tracing::debug!(json = config.json, filter = %config.default_filter, "logging initialized");
    Ok(())
}
