//! Logging configuration.
//!
//! # Example
//! ```rust,no_run
//! use samizdat::telemetry::{init_logging, LogFormat};
//!
//! init_logging(LogFormat::Pretty).expect("failed to init logging");
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: control log levels (default: `info`)

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for development.
    Pretty,
    /// Newline-delimited JSON for log pipelines.
    Json,
}

/// Initialize the global `tracing` subscriber.
///
/// # Errors
/// Returns [`Error::Config`] if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("failed to init logging: {e}")))
}
