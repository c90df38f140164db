//! # Logging
//!
//! Console output plus the mission event log.
//!
//! The event log is written through `tracing-appender` without rotation and
//! without the non-blocking worker, so each line is in the file by the time
//! the logging call returns.

use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Builds the subscriber: INFO by default (overridable through `RUST_LOG`),
/// console layer, and a plain-text layer appending to `dir/file_name`.
pub fn subscriber(dir: &Path, file_name: &str) -> impl Subscriber + Send + Sync + 'static {
    let event_log = tracing_appender::rolling::never(dir, file_name);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(event_log),
        )
}

/// Installs [`subscriber`] as the global default.
///
/// # Errors
///
/// Returns error if a global subscriber is already set.
pub fn init(dir: &Path, file_name: &str) -> Result<(), TryInitError> {
    subscriber(dir, file_name).try_init()
}
