//! Credential record entity
//!
//! One stored credential: its vault key, account data, secret, and the
//! in-memory custom flags. Every accessor checks for disposal so a disposed
//! record never hands out stale data.

use crate::core::secret::ProtectedSecret;
use crate::core::types::{CredentialType, PersistenceType};
use crate::errors::CredentialError;
use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

type Result<T> = std::result::Result<T, CredentialError>;

/// One credential, keyed in the vault by `(target, credential_type)`
///
/// The record exclusively owns its secret. Secret accessors return
/// independent copies, and disposal (explicit or on drop) wipes the secret.
pub struct CredentialRecord {
    target: String,
    domain: Option<String>,
    username: Option<String>,
    secret: ProtectedSecret,
    credential_type: CredentialType,
    persistence: PersistenceType,
    comment: Option<String>,
    last_write_time_utc: DateTime<Utc>,
    custom_flags: BTreeMap<String, String>,
    is_valid: bool,
    disposed: bool,
}

impl CredentialRecord {
    /// Creates an empty record with session persistence
    pub fn new() -> Self {
        CredentialRecord {
            target: String::new(),
            domain: None,
            username: None,
            secret: ProtectedSecret::new(),
            credential_type: CredentialType::default(),
            persistence: PersistenceType::default(),
            comment: None,
            last_write_time_utc: DateTime::<Utc>::MIN_UTC,
            custom_flags: BTreeMap::new(),
            is_valid: false,
            disposed: false,
        }
    }

    /// Creates a record carrying only a vault key
    pub fn with_key(target: impl Into<String>, credential_type: CredentialType) -> Self {
        let mut record = Self::new();
        record.target = target.into();
        record.credential_type = credential_type;
        record
    }

    /// Creates a record with target, username and secret
    pub fn with_credentials(target: impl Into<String>, username: impl Into<String>, secret: &str) -> Self {
        let mut record = Self::with_key(target, CredentialType::Generic);
        record.username = Some(username.into());
        record.secret.set(secret);
        record.refresh_validity();
        record
    }

    /// Replaces the persistence while the record is still being built
    pub(crate) fn with_persistence(mut self, persistence: PersistenceType) -> Self {
        self.persistence = persistence;
        self
    }

    fn check_not_disposed(&self) -> Result<()> {
        if self.disposed {
            return Err(CredentialError::Disposed);
        }
        Ok(())
    }

    fn refresh_validity(&mut self) {
        self.is_valid = self.username.as_deref().is_some_and(|u| !u.is_empty()) && !self.secret.is_empty();
    }

    pub fn target(&self) -> Result<&str> {
        self.check_not_disposed()?;
        Ok(&self.target)
    }

    pub fn set_target(&mut self, target: impl Into<String>) -> Result<()> {
        self.check_not_disposed()?;
        self.target = target.into();
        Ok(())
    }

    pub fn domain(&self) -> Result<Option<&str>> {
        self.check_not_disposed()?;
        Ok(self.domain.as_deref())
    }

    pub fn set_domain(&mut self, domain: Option<String>) -> Result<()> {
        self.check_not_disposed()?;
        self.domain = domain;
        Ok(())
    }

    pub fn username(&self) -> Result<Option<&str>> {
        self.check_not_disposed()?;
        Ok(self.username.as_deref())
    }

    pub fn set_username(&mut self, username: Option<String>) -> Result<()> {
        self.check_not_disposed()?;
        self.username = username;
        self.refresh_validity();
        Ok(())
    }

    /// Independent copy of the secret; clearing it leaves the record untouched
    pub fn secret(&self) -> Result<ProtectedSecret> {
        self.check_not_disposed()?;
        Ok(self.secret.copy())
    }

    /// Plaintext copy of the secret, wiped when dropped
    pub fn reveal_secret(&self) -> Result<Zeroizing<String>> {
        self.check_not_disposed()?;
        Ok(self.secret.reveal())
    }

    /// Secret length in bytes
    pub fn secret_len(&self) -> Result<usize> {
        self.check_not_disposed()?;
        Ok(self.secret.len())
    }

    /// Replaces the secret, wiping the previous one
    pub fn set_secret(&mut self, plaintext: &str) -> Result<()> {
        self.check_not_disposed()?;
        self.secret.set(plaintext);
        self.refresh_validity();
        Ok(())
    }

    /// Replaces the secret with a copy of `secret`
    pub fn set_protected_secret(&mut self, secret: &ProtectedSecret) -> Result<()> {
        self.check_not_disposed()?;
        secret.expose_with(|plaintext| self.secret.set(plaintext));
        self.refresh_validity();
        Ok(())
    }

    /// Runs `f` against the stored secret without copying it
    pub(crate) fn with_secret<R>(&self, f: impl FnOnce(&ProtectedSecret) -> R) -> Result<R> {
        self.check_not_disposed()?;
        Ok(f(&self.secret))
    }

    pub fn credential_type(&self) -> Result<CredentialType> {
        self.check_not_disposed()?;
        Ok(self.credential_type)
    }

    pub fn set_credential_type(&mut self, credential_type: CredentialType) -> Result<()> {
        self.check_not_disposed()?;
        self.credential_type = credential_type;
        Ok(())
    }

    pub fn persistence(&self) -> Result<PersistenceType> {
        self.check_not_disposed()?;
        Ok(self.persistence)
    }

    pub fn set_persistence(&mut self, persistence: PersistenceType) -> Result<()> {
        self.check_not_disposed()?;
        self.persistence = persistence;
        Ok(())
    }

    pub fn comment(&self) -> Result<Option<&str>> {
        self.check_not_disposed()?;
        Ok(self.comment.as_deref())
    }

    pub fn set_comment(&mut self, comment: Option<String>) -> Result<()> {
        self.check_not_disposed()?;
        self.comment = comment;
        Ok(())
    }

    /// Time of the last successful vault write or read; minimum instant if never
    pub fn last_write_time_utc(&self) -> Result<DateTime<Utc>> {
        self.check_not_disposed()?;
        Ok(self.last_write_time_utc)
    }

    pub fn last_write_time_local(&self) -> Result<DateTime<Local>> {
        Ok(self.last_write_time_utc()?.with_timezone(&Local))
    }

    /// Only the store sets the timestamp
    pub(crate) fn stamp_last_write(&mut self, instant: DateTime<Utc>) {
        self.last_write_time_utc = instant;
    }

    pub fn custom_flags(&self) -> Result<&BTreeMap<String, String>> {
        self.check_not_disposed()?;
        Ok(&self.custom_flags)
    }

    /// Sets a flag; returns true if the map changed
    pub fn add_flag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<bool> {
        self.check_not_disposed()?;
        let value = value.into();
        let previous = self.custom_flags.insert(key.into(), value.clone());
        Ok(previous.as_deref() != Some(value.as_str()))
    }

    /// Removes a flag; returns true if it was present
    pub fn remove_flag(&mut self, key: &str) -> Result<bool> {
        self.check_not_disposed()?;
        Ok(self.custom_flags.remove(key).is_some())
    }

    pub fn reset_flags(&mut self) -> Result<()> {
        self.check_not_disposed()?;
        self.custom_flags.clear();
        Ok(())
    }

    /// True iff the username is non-empty and the secret is non-empty
    pub fn is_valid(&self) -> Result<bool> {
        self.check_not_disposed()?;
        Ok(self.is_valid)
    }

    /// Recomputes [`CredentialRecord::is_valid`]
    pub fn validate(&mut self) -> Result<bool> {
        self.check_not_disposed()?;
        self.refresh_validity();
        Ok(self.is_valid)
    }

    /// Resets account data to the empty state; target and type are kept
    pub fn clear(&mut self) -> Result<()> {
        self.check_not_disposed()?;
        self.username = None;
        self.secret.clear();
        self.domain = None;
        self.custom_flags.clear();
        self.persistence = PersistenceType::default();
        self.last_write_time_utc = DateTime::<Utc>::MIN_UTC;
        self.refresh_validity();
        Ok(())
    }

    /// Replaces every vault-backed field with `source`'s values
    ///
    /// Custom flags are not vault-backed and stay as they are.
    pub(crate) fn overwrite_from(&mut self, mut source: CredentialRecord) -> Result<()> {
        self.check_not_disposed()?;
        source.check_not_disposed()?;
        self.target = std::mem::take(&mut source.target);
        self.domain = source.domain.take();
        self.username = source.username.take();
        source.secret.expose_with(|plaintext| self.secret.set(plaintext));
        self.credential_type = source.credential_type;
        self.persistence = source.persistence;
        self.comment = source.comment.take();
        self.last_write_time_utc = source.last_write_time_utc;
        self.refresh_validity();
        Ok(())
    }

    /// Wipes the secret and makes every later call fail. Idempotent.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.secret.clear();
            self.disposed = true;
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Default for CredentialRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CredentialRecord {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("target", &self.target)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("secret", &self.secret)
            .field("credential_type", &self.credential_type)
            .field("persistence", &self.persistence)
            .field("comment", &self.comment)
            .field("last_write_time_utc", &self.last_write_time_utc)
            .field("custom_flags", &self.custom_flags)
            .field("is_valid", &self.is_valid)
            .field("disposed", &self.disposed)
            .finish()
    }
}
