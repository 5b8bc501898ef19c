//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

/// Build the filter from the configured directive.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("Invalid log filter '{}'", level))
}

/// Install the global subscriber. `verbose` forces debug output for this crate.
pub fn init_tracing(logging: &LoggingSection, verbose: bool) -> Result<()> {
    let level = if verbose {
        format!("{},brandhouse=debug", logging.level)
    } else {
        logging.level.clone()
    };
    let filter = build_filter(&level)?;

    let result = if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
