//! Vault adapters
//!
//! All unsafe platform calls are isolated here. The store talks to a
//! `CredentialVault` in the vault's native record shape; implementations
//! exist for the Windows Credential Manager and for an in-process map.

pub mod memlock;
pub mod memory;
pub mod native;
#[cfg(windows)]
pub mod windows;

pub use memory::InMemoryVault;
pub use native::{FileTime, NativeCredential};
#[cfg(windows)]
pub use self::windows::WindowsCredentialVault;

use crate::core::CredentialType;
use crate::errors::VaultFailure;

/// Native credential vault operations
///
/// This trait abstracts the OS credential store to enable:
/// - Testing with the in-memory implementation
/// - Hosts without Windows Credential Manager
/// - Easier reasoning about what crosses the native boundary
///
/// Implementations never see `CredentialRecord`; they exchange
/// [`NativeCredential`] values keyed by `(target, type)`.
pub trait CredentialVault: Send + Sync {
    /// Creates or replaces the entry keyed by the record's target and type
    ///
    /// The vault stamps `last_written` itself.
    fn write(&self, credential: &NativeCredential) -> Result<(), VaultFailure>;

    /// Reads the entry for `(target, kind)`
    ///
    /// # Returns
    /// * `Ok(Some(credential))` - If the entry exists
    /// * `Ok(None)` - If no entry matches
    /// * `Err(VaultFailure)` - If the vault refused the call
    fn read(&self, target: &str, kind: CredentialType) -> Result<Option<NativeCredential>, VaultFailure>;

    /// Deletes the entry for `(target, kind)`
    ///
    /// # Returns
    /// * `Ok(true)` - Entry deleted
    /// * `Ok(false)` - No entry matched
    fn delete(&self, target: &str, kind: CredentialType) -> Result<bool, VaultFailure>;

    /// Lists target names matching `filter`
    ///
    /// A filter ending in `*` matches by prefix, any other filter matches a
    /// whole name, and `None` lists every entry. Matching ignores ASCII case.
    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, VaultFailure>;
}

/// Applies the vault's enumerate filter rules to one target name
pub(crate) fn filter_matches(filter: Option<&str>, target: &str) -> bool {
    match filter {
        None => true,
        Some(filter) => match filter.strip_suffix('*') {
            Some(prefix) => target
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            None => target.eq_ignore_ascii_case(filter),
        },
    }
}
