//! Tracing subscriber setup.

use herostat_core::config::{GeneralConfig, LogFormat};
use tracing_subscriber::EnvFilter;

use crate::error::{IndexerError, Result};

/// Install the global `fmt` subscriber described by `config`.
///
/// `RUST_LOG` wins over `config.log_level` when set. Installing twice is an
/// error from `tracing-subscriber`, reported as [`IndexerError::Telemetry`].
///
/// # Errors
/// Returns `IndexerError::Telemetry` for an invalid filter or when a global
/// subscriber is already set.
pub fn init(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| IndexerError::Telemetry(e.to_string()))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| IndexerError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_reported() {
        let config = GeneralConfig::default();
        let _ = init(&config);
        assert!(matches!(init(&config), Err(IndexerError::Telemetry(_))));
    }
}
