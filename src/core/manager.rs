//! Credential manager facade
//!
//! `CredentialManager` pairs one `CredentialRecord` with a `CredentialStore`
//! and tracks where that record stands relative to the vault.

use crate::core::record::CredentialRecord;
use crate::core::secret::ProtectedSecret;
use crate::core::settings::CredentialsSettings;
use crate::core::store::CredentialStore;
use crate::core::types::{CredentialState, CredentialSummary, CredentialType, PersistenceType};
use crate::errors::{CredentialError, VaultFailure};
use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};
use zeroize::Zeroizing;

type Result<T> = std::result::Result<T, CredentialError>;

/// One credential bound to a vault
///
/// Lifecycle: `Unbound` until a target is set, `Bound` once it has one,
/// `Persisted` after a successful save, `Hydrated` after a successful load,
/// and `Disposed` for good after [`CredentialManager::dispose`] (or drop).
///
/// # Example
///
/// ```
/// use credvault::{CredentialManager, CredentialStore, CredentialType};
///
/// let store = CredentialStore::in_memory();
/// let mut saved = CredentialManager::with_credentials(store.clone(), "app", "user", "hunter2");
/// assert!(saved.save().unwrap());
///
/// let mut loaded = CredentialManager::with_target(store, "app");
/// assert!(loaded.load().unwrap());
/// assert_eq!(loaded.username().unwrap(), Some("user"));
/// assert_eq!(loaded.credential_type().unwrap(), CredentialType::Generic);
/// ```
pub struct CredentialManager {
    record: CredentialRecord,
    store: CredentialStore,
    settings: CredentialsSettings,
    status: CredentialState,
}

impl CredentialManager {
    fn from_record(store: CredentialStore, record: CredentialRecord) -> Self {
        let record = record.with_persistence(store.config().default_persistence);
        let status = Self::status_for(&record);
        CredentialManager {
            record,
            store,
            settings: CredentialsSettings::default(),
            status,
        }
    }

    fn status_for(record: &CredentialRecord) -> CredentialState {
        match record.target() {
            Ok(target) if !target.is_empty() => CredentialState::Bound,
            _ => CredentialState::Unbound,
        }
    }

    /// Creates an unbound manager using the store's default persistence
    pub fn new(store: CredentialStore) -> Self {
        Self::from_record(store, CredentialRecord::new())
    }

    /// Creates a manager for an existing or future entry, ready to `load`
    pub fn with_target(store: CredentialStore, target: impl Into<String>) -> Self {
        Self::from_record(store, CredentialRecord::with_key(target, CredentialType::Generic))
    }

    /// Creates a manager carrying a full username/secret pair, ready to `save`
    pub fn with_credentials(
        store: CredentialStore,
        target: impl Into<String>,
        username: impl Into<String>,
        secret: &str,
    ) -> Self {
        Self::from_record(store, CredentialRecord::with_credentials(target, username, secret))
    }

    /// Creates an unbound manager that validates with `settings` on save
    pub fn with_settings(store: CredentialStore, settings: CredentialsSettings) -> Self {
        let mut manager = Self::new(store);
        manager.settings = settings;
        manager
    }

    /// Loads `(target, kind)` from `store`
    ///
    /// # Returns
    /// * `Ok(Some(manager))` - Hydrated manager
    /// * `Ok(None)` - No such entry
    pub fn load_from(store: &CredentialStore, target: &str, kind: CredentialType) -> Result<Option<Self>> {
        let Some(record) = store.read(target, kind)? else {
            return Ok(None);
        };
        Ok(Some(CredentialManager {
            record,
            store: store.clone(),
            settings: CredentialsSettings::default(),
            status: CredentialState::Hydrated,
        }))
    }

    fn check_not_disposed(&self) -> Result<()> {
        if self.record.is_disposed() {
            return Err(CredentialError::Disposed);
        }
        Ok(())
    }

    pub fn state(&self) -> CredentialState {
        if self.record.is_disposed() {
            CredentialState::Disposed
        } else {
            self.status
        }
    }

    pub fn settings(&self) -> &CredentialsSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CredentialsSettings) -> Result<()> {
        self.check_not_disposed()?;
        self.settings = settings;
        Ok(())
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn target(&self) -> Result<&str> {
        self.record.target()
    }

    /// Rebinds to another vault key; an empty target unbinds
    pub fn set_target(&mut self, target: impl Into<String>) -> Result<()> {
        self.record.set_target(target)?;
        self.status = Self::status_for(&self.record);
        Ok(())
    }

    pub fn domain(&self) -> Result<Option<&str>> {
        self.record.domain()
    }

    pub fn set_domain(&mut self, domain: Option<String>) -> Result<()> {
        self.record.set_domain(domain)
    }

    pub fn username(&self) -> Result<Option<&str>> {
        self.record.username()
    }

    pub fn set_username(&mut self, username: Option<String>) -> Result<()> {
        self.record.set_username(username)
    }

    /// Independent copy of the secret
    pub fn secret(&self) -> Result<ProtectedSecret> {
        self.record.secret()
    }

    pub fn reveal_secret(&self) -> Result<Zeroizing<String>> {
        self.record.reveal_secret()
    }

    pub fn secret_len(&self) -> Result<usize> {
        self.record.secret_len()
    }

    pub fn set_secret(&mut self, plaintext: &str) -> Result<()> {
        self.record.set_secret(plaintext)
    }

    pub fn set_protected_secret(&mut self, secret: &ProtectedSecret) -> Result<()> {
        self.record.set_protected_secret(secret)
    }

    pub fn credential_type(&self) -> Result<CredentialType> {
        self.record.credential_type()
    }

    pub fn set_credential_type(&mut self, credential_type: CredentialType) -> Result<()> {
        self.record.set_credential_type(credential_type)
    }

    pub fn persistence(&self) -> Result<PersistenceType> {
        self.record.persistence()
    }

    pub fn set_persistence(&mut self, persistence: PersistenceType) -> Result<()> {
        self.record.set_persistence(persistence)
    }

    pub fn comment(&self) -> Result<Option<&str>> {
        self.record.comment()
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> Result<()> {
        self.record.set_comment(comment)
    }

    pub fn last_write_time_utc(&self) -> Result<DateTime<Utc>> {
        self.record.last_write_time_utc()
    }

    pub fn last_write_time_local(&self) -> Result<DateTime<Local>> {
        self.record.last_write_time_local()
    }

    pub fn custom_flags(&self) -> Result<&BTreeMap<String, String>> {
        self.record.custom_flags()
    }

    /// Sets an in-memory flag; flags are never written to the vault
    pub fn add_flag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<bool> {
        self.record.add_flag(key, value)
    }

    pub fn remove_flag(&mut self, key: &str) -> Result<bool> {
        self.record.remove_flag(key)
    }

    pub fn reset_flags(&mut self) -> Result<()> {
        self.record.reset_flags()
    }

    pub fn is_valid(&self) -> Result<bool> {
        self.record.is_valid()
    }

    pub fn validate(&mut self) -> Result<bool> {
        self.record.validate()
    }

    /// Resets username, secret, domain, flags, persistence and timestamp
    pub fn clear(&mut self) -> Result<()> {
        self.record.clear()?;
        self.record.set_persistence(self.store.config().default_persistence)
    }

    /// Writes the credential to the vault
    ///
    /// # Returns
    /// * `Ok(true)` - Saved; state becomes `Persisted`
    /// * `Ok(false)` - The vault rejected the write (see [`CredentialManager::last_vault_failure`])
    /// * `Err(InvalidOperation)` - No target
    /// * `Err(InvalidCredentials)` - Username or secret rejected by the settings
    /// * `Err(BlobTooLarge)` - Secret above the vault maximum
    pub fn save(&mut self) -> Result<bool> {
        self.check_not_disposed()?;
        if self.record.target()?.is_empty() {
            return Err(CredentialError::invalid_operation(
                "Target must be specified to save a credential.",
            ));
        }
        let username = self.record.username()?;
        self.record
            .with_secret(|secret| self.settings.check(username, secret))??;

        let saved = self.store.write(&mut self.record)?;
        if saved {
            self.status = CredentialState::Persisted;
        }
        Ok(saved)
    }

    /// Replaces this credential's vault-backed fields with the stored entry
    ///
    /// A full overwrite: fields absent from the entry become empty. Custom
    /// flags are kept.
    ///
    /// # Returns
    /// * `Ok(true)` - Loaded; state becomes `Hydrated`
    /// * `Ok(false)` - No entry for `(target, type)`; nothing changed
    pub fn load(&mut self) -> Result<bool> {
        self.check_not_disposed()?;
        let target = self.record.target()?.to_string();
        let kind = self.record.credential_type()?;

        match self.store.read(&target, kind)? {
            Some(stored) => {
                self.record.overwrite_from(stored)?;
                self.status = CredentialState::Hydrated;
                debug!(cred_target = %target, kind = %kind, "Credential hydrated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the vault entry; the in-memory values stay
    pub fn delete(&mut self) -> Result<bool> {
        self.check_not_disposed()?;
        let deleted = self
            .store
            .delete(self.record.target()?, self.record.credential_type()?)?;
        if deleted {
            self.status = CredentialState::Bound;
        }
        Ok(deleted)
    }

    /// True if the vault holds an entry for `(target, type)`
    pub fn exists(&self) -> Result<bool> {
        self.check_not_disposed()?;
        self.store
            .exists(self.record.target()?, self.record.credential_type()?)
    }

    /// Most recent native failure seen by this manager's store
    pub fn last_vault_failure(&self) -> Option<VaultFailure> {
        self.store.last_failure()
    }

    /// Secret-free snapshot for display layers
    pub fn summary(&self) -> Result<CredentialSummary> {
        let last_write = self.record.last_write_time_utc()?;
        Ok(CredentialSummary {
            target: self.record.target()?.to_string(),
            domain: self.record.domain()?.map(str::to_string),
            username: self.record.username()?.map(str::to_string),
            comment: self.record.comment()?.map(str::to_string),
            credential_type: self.record.credential_type()?,
            persistence: self.record.persistence()?,
            last_write_time_utc: (last_write > DateTime::<Utc>::MIN_UTC).then(|| last_write.to_rfc3339()),
            is_valid: self.record.is_valid()?,
            state: self.state(),
        })
    }

    /// True when both refer to the same vault entry, case-insensitively
    pub fn same_entry(&self, other: &CredentialManager) -> Result<bool> {
        Ok(self.record.credential_type()? == other.record.credential_type()?
            && self.record.target()?.eq_ignore_ascii_case(other.record.target()?))
    }

    /// Constant-time comparison of the stored secret with `candidate`
    pub fn secret_matches(&self, candidate: &ProtectedSecret) -> Result<bool> {
        self.record.with_secret(|secret| secret == candidate)
    }

    /// Wipes the secret; every later call fails with `Disposed`. Idempotent.
    pub fn dispose(&mut self) {
        if !self.record.is_disposed() {
            if let Ok(target) = self.record.target() {
                info!(cred_target = %target, "Credential disposed");
            }
            self.record.dispose();
            self.status = CredentialState::Disposed;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.record.is_disposed()
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("record", &self.record)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}
