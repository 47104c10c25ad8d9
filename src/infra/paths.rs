//! Path utilities for credvault
//!
//! Centralizes where configuration and log files live, separate from the
//! credential logic.

use crate::errors::CredentialError;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "credvault";

/// Gets the credvault application data directory.
///
/// # Returns
/// * `Ok(PathBuf)` - `%APPDATA%\credvault` on Windows, `$XDG_CONFIG_HOME/credvault`
///   or `$HOME/.config/credvault` elsewhere
/// * `Err(CredentialError::Config)` - If none of the variables is set
///
/// # Side Effects
/// None. Directories are created by the callers that write into them.
pub fn app_dir() -> Result<PathBuf, CredentialError> {
    let base = if cfg!(windows) {
        std::env::var_os("APPDATA").map(PathBuf::from)
    } else {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
    };

    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| CredentialError::Config {
            reason: "Failed to locate the application data directory".to_string(),
            source: None,
        })
}

/// Gets the full path to the JSON configuration file.
///
/// # Returns
/// * `Ok(PathBuf)` - `<app_dir>/config.json`
pub fn config_file_path() -> Result<PathBuf, CredentialError> {
    Ok(app_dir()?.join("config.json"))
}

/// Gets the default log directory, creating it if needed.
///
/// # Side Effects
/// - Creates `<app_dir>/logs` and its parents
///
/// # Failure Modes
/// - Application directory cannot be located
/// - Permission denied when creating the directory
pub fn default_log_dir() -> Result<PathBuf, CredentialError> {
    let dir = app_dir()?.join("logs");
    std::fs::create_dir_all(&dir).map_err(|e| CredentialError::Io {
        path: dir.to_string_lossy().to_string(),
        source: e,
    })?;
    Ok(dir)
}
