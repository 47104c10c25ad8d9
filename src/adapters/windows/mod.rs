//! Windows-specific adapters
//!
//! This module contains platform-specific implementations for Windows.
//! All Windows credential API calls are isolated here.

pub mod credential_manager;

pub use credential_manager::WindowsCredentialVault;
