//! Error types for credvault
//!
//! This module defines the unified error type for the crate, providing
//! structured error handling with context and user-friendly messages.

use std::io;
use thiserror::Error;

/// Win32 `ERROR_NOT_FOUND`, returned by the vault when no entry matches.
pub const ERROR_NOT_FOUND: u32 = 1168;

/// Main error type for credvault
///
/// All functions across the core, adapter and infra layers return this error
/// type for consistent error handling and reporting.
///
/// # Architecture Notes
/// - Uses thiserror for automatic Display and Error trait implementations
/// - Each variant includes contextual information for debugging
/// - #[source] attribute enables error chain traversal
/// - A GUI layer receives the `Serialize` form (message, code, category, remediation)
/// - Messages never contain secret material
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Operation attempted on a disposed credential
    #[error("Credential object is already disposed")]
    Disposed,

    /// Structural misuse, such as a vault call without a target
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        reason: String,
    },

    /// Secret exceeds the vault's maximum blob size
    #[error("Secret of {size} UTF-16 units exceeds the vault maximum of {max}")]
    BlobTooLarge {
        size: usize,
        max: usize,
    },

    /// No vault entry for the target
    /// This is a normal case when nothing has been saved, not a true fault
    #[error("Credentials not found for target: {target}")]
    NotFound {
        target: String,
    },

    /// The OS vault rejected an operation
    #[error("Credential vault error: {operation} (code {code})")]
    Vault {
        operation: String,
        code: u32,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Username or secret rejected by the configured settings
    #[error("Invalid credentials: {reason}")]
    InvalidCredentials {
        reason: String,
    },

    /// A native vault record could not be decoded
    #[error("Failed to decode vault record: {context}")]
    Encoding {
        context: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// File I/O error
    #[error("File I/O error: {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CredentialError {
    /// Shorthand for [`CredentialError::InvalidOperation`]
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        CredentialError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Returns an error code for categorization
    pub fn code(&self) -> &'static str {
        match self {
            CredentialError::Disposed => "DISPOSED",
            CredentialError::InvalidOperation { .. } => "INVALID_OPERATION",
            CredentialError::BlobTooLarge { .. } => "BLOB_TOO_LARGE",
            CredentialError::NotFound { .. } => "CRED_NOT_FOUND",
            CredentialError::Vault { .. } => "VAULT",
            CredentialError::InvalidCredentials { .. } => "CRED_INVALID",
            CredentialError::Encoding { .. } => "ENCODING",
            CredentialError::Config { .. } => "CONFIG",
            CredentialError::Io { .. } => "IO_ERROR",
            CredentialError::Json { .. } => "JSON_ERROR",
        }
    }

    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            CredentialError::Disposed => {
                "This credential has been disposed and can no longer be used.".to_string()
            }
            CredentialError::InvalidOperation { reason } => reason.clone(),
            CredentialError::BlobTooLarge { max, .. } => {
                format!("The password is too long. The credential vault accepts at most {} characters.", max)
            }
            CredentialError::NotFound { target } => {
                format!("No credentials saved for '{}'", target)
            }
            CredentialError::Vault { operation, .. } => {
                format!("Failed to access the credential vault: {}", operation)
            }
            CredentialError::InvalidCredentials { reason } => {
                format!("Invalid credentials: {}", reason)
            }
            CredentialError::Encoding { context } => {
                format!("The stored credential could not be read: {}", context)
            }
            CredentialError::Config { reason, .. } => {
                format!("Configuration error: {}", reason)
            }
            CredentialError::Io { path, .. } => {
                format!("Failed to access file: {}", path)
            }
            CredentialError::Json { context, .. } => {
                format!("Failed to process {}", context)
            }
        }
    }

    /// Returns optional remediation steps for the error
    pub fn remediation(&self) -> Option<String> {
        match self {
            CredentialError::NotFound { .. } => {
                Some("Save the credentials first, then load them again.".to_string())
            }
            CredentialError::Vault { code, .. } if *code == 5 => {
                Some("Access was denied. Check that the current user may use the credential vault.".to_string())
            }
            CredentialError::Vault { .. } => {
                Some("Open Credential Manager and try removing and re-adding the entry.".to_string())
            }
            CredentialError::BlobTooLarge { .. } => {
                Some("Use a shorter password.".to_string())
            }
            _ => None,
        }
    }

    /// Returns the category for error logging
    pub fn category(&self) -> &'static str {
        match self {
            CredentialError::Disposed |
            CredentialError::InvalidOperation { .. } => "USAGE",

            CredentialError::BlobTooLarge { .. } |
            CredentialError::NotFound { .. } |
            CredentialError::Vault { .. } |
            CredentialError::Encoding { .. } => "VAULT",

            CredentialError::InvalidCredentials { .. } => "CREDENTIALS",

            CredentialError::Config { .. } |
            CredentialError::Io { .. } |
            CredentialError::Json { .. } => "CONFIG",
        }
    }
}

// Implement Serialize for sending errors across the GUI boundary
impl serde::Serialize for CredentialError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CredentialError", 4)?;
        state.serialize_field("message", &self.user_message())?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("category", &self.category())?;
        state.serialize_field("remediation", &self.remediation())?;
        state.end()
    }
}

impl From<CredentialError> for String {
    fn from(err: CredentialError) -> String {
        err.user_message()
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(err: serde_json::Error) -> Self {
        CredentialError::Json {
            context: "serialization".to_string(),
            source: err,
        }
    }
}

impl From<VaultFailure> for CredentialError {
    fn from(failure: VaultFailure) -> Self {
        CredentialError::Vault {
            operation: failure.operation.clone(),
            code: failure.code,
            source: Some(failure.into()),
        }
    }
}

/// Failure reported by a native vault call
///
/// Carries the native error code (a Win32 error on Windows) so callers can
/// diagnose a `false` result from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed with native error {code}")]
pub struct VaultFailure {
    pub operation: String,
    pub code: u32,
}

impl VaultFailure {
    pub fn new(operation: impl Into<String>, code: u32) -> Self {
        VaultFailure {
            operation: operation.into(),
            code,
        }
    }

    /// True when the vault reported that no entry matched
    pub fn is_not_found(&self) -> bool {
        self.code == ERROR_NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        assert_eq!(CredentialError::Disposed.code(), "DISPOSED");
        assert_eq!(CredentialError::Disposed.category(), "USAGE");
        let err = CredentialError::BlobTooLarge { size: 600, max: 512 };
        assert_eq!(err.code(), "BLOB_TOO_LARGE");
        assert_eq!(err.category(), "VAULT");
        assert!(err.remediation().is_some());
    }

    #[test]
    fn test_vault_failure_conversion_keeps_code() {
        let failure = VaultFailure::new("write credential 'x'", 5);
        assert!(!failure.is_not_found());
        let err: CredentialError = failure.into();
        match err {
            CredentialError::Vault { code, ref operation, .. } => {
                assert_eq!(code, 5);
                assert_eq!(operation, "write credential 'x'");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.remediation().unwrap().contains("denied"));
    }

    #[test]
    fn test_not_found_failure() {
        assert!(VaultFailure::new("read", ERROR_NOT_FOUND).is_not_found());
    }

    #[test]
    fn test_serialize_error_payload() {
        let err = CredentialError::invalid_operation("Target must be specified to delete a credential.");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_OPERATION");
        assert_eq!(json["category"], "USAGE");
        assert_eq!(json["message"], "Target must be specified to delete a credential.");
        assert!(json["remediation"].is_null());
    }
}
