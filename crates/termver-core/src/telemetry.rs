//! Tracing initialisation for termver services.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// Newline-delimited JSON for log aggregation pipelines.
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Idempotent: the
/// global subscriber can only be installed once per process, later calls
/// are ignored.
pub fn init_tracing(format: LogFormat, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok(),
    };
}
