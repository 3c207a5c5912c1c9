//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the filter passed in, so operators can turn up a
//! single module without a rebuild.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global fmt subscriber. Does nothing if one is already set.
pub fn init(default_filter: &str) {
    if try_init(default_filter).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Installs a global fmt subscriber, failing if one is already set.
pub fn try_init(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_line_number(false))
        .try_init()?;

    tracing::info!(filter = default_filter, "logging initialized");
    Ok(())
}
