//! Logging infrastructure for credvault
//!
//! Installs a `tracing` subscriber: console output on stderr, plus a daily
//! rolling log file when a log directory is configured. Library code logs
//! through `tracing` macros only and never records secret material.

use crate::errors::CredentialError;
use crate::infra::config::VaultConfig;
use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "credvault.log";

/// Keeps the non-blocking file writer alive for the life of the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Builds the level filter: `RUST_LOG` if set, else the configured filter
pub fn build_filter(config: &VaultConfig) -> Result<EnvFilter, CredentialError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| CredentialError::Config {
            reason: format!("invalid log filter '{}'", config.log_filter),
            source: Some(anyhow::Error::new(e)),
        })
}

/// Initializes tracing for structured logging
///
/// Safe to call more than once; only the first successful call installs a
/// subscriber, later calls (or a subscriber installed by the host
/// application) leave the existing one in place.
///
/// # Failure Modes
/// - Invalid filter directive
/// - Log directory cannot be created
pub fn init_tracing(config: &VaultConfig) -> Result<(), CredentialError> {
    let filter = build_filter(config)?;
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let installed = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| CredentialError::Io {
                path: dir.to_string_lossy().to_string(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);

            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init()
                .is_ok();
            if installed {
                let _ = FILE_GUARD.set(guard);
            }
            installed
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init()
            .is_ok(),
    };

    if installed {
        debug!(
            version = env!("CARGO_PKG_VERSION"),
            os = std::env::consts::OS,
            log_dir = ?config.log_dir,
            "Tracing initialized"
        );
    } else {
        debug!("A global tracing subscriber is already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = VaultConfig {
            log_filter: "credvault=loud".to_string(),
            ..VaultConfig::default()
        };
        assert!(matches!(build_filter(&config), Err(CredentialError::Config { .. })));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = VaultConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }
}
