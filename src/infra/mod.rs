//! Infrastructure module - configuration, logging, paths

pub mod config;
pub mod logging;
pub mod paths;

pub use config::VaultConfig;
pub use logging::init_tracing;
