//! Core module - credential entities and vault-facing operations

pub mod manager;
pub mod record;
pub mod secret;
pub mod settings;
pub mod store;
pub mod types;

pub use manager::CredentialManager;
pub use record::CredentialRecord;
pub use secret::ProtectedSecret;
pub use settings::CredentialsSettings;
pub use store::CredentialStore;
pub use types::*;
