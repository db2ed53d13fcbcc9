//! Tracing setup for the player binary
//!
//! The subscriber is installed before the config file is read, so loading
//! is itself logged. Once the file is loaded its `[logging] level` replaces
//! the bootstrap filter, unless `RUST_LOG` is set.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle for swapping the active filter
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter in force until the config file is read
pub fn bootstrap_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::default().filter_directive()))
}

/// Install the global subscriber
pub fn init() -> FilterHandle {
    let (filter, handle) = reload::Layer::new(bootstrap_filter());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

/// Switch to the configured level; `RUST_LOG` keeps precedence
pub fn apply_config(handle: &FilterHandle, config: &LoggingConfig) -> Result<()> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return Ok(());
    }
    handle
        .reload(EnvFilter::new(config.filter_directive()))
        .map_err(|e| Error::Config(format!("Failed to apply log level: {}", e)))
}
