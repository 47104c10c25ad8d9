//! Core domain types for credvault

use crate::errors::CredentialError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Credential type, selecting the vault sub-namespace
///
/// Part of the vault key together with the target name. Discriminants are the
/// native `CRED_TYPE_*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum CredentialType {
    #[default]
    Generic = 1,
    DomainPassword = 2,
    DomainCertificate = 3,
    DomainVisiblePassword = 4,
    GenericCertificate = 5,
    DomainExtended = 6,
}

impl CredentialType {
    /// Native type code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Maps a native type code back to a credential type
    pub fn from_code(code: u32) -> Result<Self, CredentialError> {
        match code {
            1 => Ok(CredentialType::Generic),
            2 => Ok(CredentialType::DomainPassword),
            3 => Ok(CredentialType::DomainCertificate),
            4 => Ok(CredentialType::DomainVisiblePassword),
            5 => Ok(CredentialType::GenericCertificate),
            6 => Ok(CredentialType::DomainExtended),
            other => Err(CredentialError::Encoding {
                context: format!("unknown credential type code {}", other),
            }),
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialType::Generic => "Generic",
            CredentialType::DomainPassword => "DomainPassword",
            CredentialType::DomainCertificate => "DomainCertificate",
            CredentialType::DomainVisiblePassword => "DomainVisiblePassword",
            CredentialType::GenericCertificate => "GenericCertificate",
            CredentialType::DomainExtended => "DomainExtended",
        };
        f.write_str(name)
    }
}

/// Vault durability scope
///
/// Discriminants are the native `CRED_PERSIST_*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum PersistenceType {
    /// Lives for the logon session only
    #[default]
    Session = 1,
    /// Survives reboots on this machine
    LocalComputer = 2,
    /// Roams with the user profile
    Enterprise = 3,
}

impl PersistenceType {
    /// Native persistence code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Maps a native persistence code back to a persistence type
    pub fn from_code(code: u32) -> Result<Self, CredentialError> {
        match code {
            1 => Ok(PersistenceType::Session),
            2 => Ok(PersistenceType::LocalComputer),
            3 => Ok(PersistenceType::Enterprise),
            other => Err(CredentialError::Encoding {
                context: format!("unknown persistence code {}", other),
            }),
        }
    }
}

impl FromStr for PersistenceType {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(PersistenceType::Session),
            "localcomputer" | "local_computer" | "local" => Ok(PersistenceType::LocalComputer),
            "enterprise" => Ok(PersistenceType::Enterprise),
            other => Err(CredentialError::Config {
                reason: format!("unknown persistence type '{}'", other),
                source: None,
            }),
        }
    }
}

/// Persistence status of a credential held by the manager facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialState {
    /// No target assigned yet
    Unbound,
    /// Target assigned, not yet saved or loaded
    Bound,
    /// Last save succeeded
    Persisted,
    /// Last load succeeded
    Hydrated,
    /// Terminal; every operation fails
    Disposed,
}

impl CredentialState {
    /// True for every state that carries a target
    pub fn is_bound(self) -> bool {
        matches!(
            self,
            CredentialState::Bound | CredentialState::Persisted | CredentialState::Hydrated
        )
    }
}

/// Secret-free view of a credential for display layers
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub target: String,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub comment: Option<String>,
    pub credential_type: CredentialType,
    pub persistence: PersistenceType,
    /// ISO 8601 formatted timestamp of the last vault write, if any
    pub last_write_time_utc: Option<String>,
    pub is_valid: bool,
    pub state: CredentialState,
}
