//! Subscriber setup for the `tracing` events emitted by this crate.
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install the global subscriber described by `config`.
///
/// File output wins over console output when both are enabled. Returns an
/// error if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let builder = fmt().with_env_filter(filter).with_target(false);

    let installed = match (file_target(config)?, config.json_format) {
        (Some(file), true) => builder
            .json()
            .with_writer(Mutex::new(file))
            .try_init(),
        (Some(file), false) => builder
            .compact()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        (None, true) => builder.json().try_init(),
        (None, false) => builder.compact().try_init(),
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::debug!(app = %config.app_name, "logging initialised");
    Ok(())
}

fn file_target(config: &LoggingConfig) -> Result<Option<std::fs::File>> {
    if !config.log_to_file {
        return Ok(None);
    }
    let path = config.log_file_path.as_deref().ok_or_else(|| {
        ProtocolError::ConfigError("log_file_path must be specified when log_to_file is true".into())
    })?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file {path}: {e}")))?;
    Ok(Some(file))
}
