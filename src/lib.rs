//! # credvault
//!
//! Stores username/secret pairs in the operating system's credential vault
//! (Windows Credential Manager) and keeps secrets in locked, wiped memory
//! while they are held by the process.
//!
//! ## Architecture
//!
//! The library is organized into modular components:
//!
//! - **core**: Credential records, protected secrets, the store and the manager facade
//! - **adapters**: Native vault implementations behind the `CredentialVault` trait
//! - **errors**: Unified error handling with CredentialError
//! - **infra**: Infrastructure concerns (logging, configuration, paths)
//!
//! ## Example
//!
//! ```
//! use credvault::{CredentialManager, CredentialStore};
//!
//! let store = CredentialStore::in_memory();
//! let mut credential = CredentialManager::with_credentials(store.clone(), "app", "user", "hunter2");
//! assert!(credential.save().unwrap());
//! assert!(credential.exists().unwrap());
//! assert!(credential.delete().unwrap());
//! ```
//!
//! ## Security Considerations
//!
//! - Secrets are stored by the OS vault (encrypted by the OS)
//! - Secrets are never logged (logs only show target names and blob sizes)
//! - In memory, secrets live in page-locked buffers that are zeroed on replace, clear and drop
//! - Disposed credentials refuse every further access

mod adapters;
mod core;
mod errors;
mod infra;

// Re-export commonly used types
pub use crate::core::*;
pub use crate::errors::{CredentialError, VaultFailure, ERROR_NOT_FOUND};
pub use crate::infra::paths::{app_dir, config_file_path, default_log_dir};
pub use crate::infra::{init_tracing, VaultConfig};

pub use crate::adapters::{CredentialVault, FileTime, InMemoryVault, NativeCredential};

// Platform-specific adapters
#[cfg(windows)]
pub use crate::adapters::WindowsCredentialVault;
