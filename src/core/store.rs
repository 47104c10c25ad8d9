//! Credential store
//!
//! Gateway between `CredentialRecord` values and a native
//! [`CredentialVault`]. Translates records to the vault's record shape,
//! enforces the preconditions that must hold before any native call, and
//! turns vault non-success into boolean results while keeping the native
//! error code for diagnostics.

use crate::adapters::native::{decode_secret_blob, encode_secret_blob, FileTime, NativeCredential};
use crate::adapters::{CredentialVault, InMemoryVault};
use crate::core::record::CredentialRecord;
use crate::core::types::{CredentialType, PersistenceType};
use crate::errors::{CredentialError, VaultFailure};
use crate::infra::VaultConfig;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, CredentialError>;

/// Caller-owned handle to a credential vault
///
/// Cheap to clone; clones share the vault, the configuration and the last
/// recorded failure. Every operation is a blocking call into the vault.
#[derive(Clone)]
pub struct CredentialStore {
    vault: Arc<dyn CredentialVault>,
    config: Arc<VaultConfig>,
    last_failure: Arc<Mutex<Option<VaultFailure>>>,
}

impl CredentialStore {
    /// Creates a store over `vault`
    pub fn new(vault: Arc<dyn CredentialVault>, config: VaultConfig) -> Self {
        CredentialStore {
            vault,
            config: Arc::new(config),
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a store over a fresh [`InMemoryVault`] with default configuration
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryVault::new()), VaultConfig::default())
    }

    /// Creates a store over the platform's credential vault
    ///
    /// Windows Credential Manager on Windows. Other platforms have no
    /// supported vault yet and get a process-local [`InMemoryVault`].
    pub fn platform_default(config: VaultConfig) -> Self {
        #[cfg(windows)]
        let vault: Arc<dyn CredentialVault> = Arc::new(crate::adapters::WindowsCredentialVault::new());
        #[cfg(not(windows))]
        let vault: Arc<dyn CredentialVault> = {
            warn!("No OS credential vault on this platform, credentials will not outlive the process");
            Arc::new(InMemoryVault::new())
        };
        Self::new(vault, config)
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Most recent native failure reported by the vault, if any
    pub fn last_failure(&self) -> Option<VaultFailure> {
        self.lock_failure().clone()
    }

    fn lock_failure(&self) -> std::sync::MutexGuard<'_, Option<VaultFailure>> {
        self.last_failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_failure(&self, failure: VaultFailure) {
        warn!(
            operation = %failure.operation,
            code = failure.code,
            "Credential vault operation failed"
        );
        *self.lock_failure() = Some(failure);
    }

    fn require_target(target: &str, action: &str) -> Result<()> {
        if target.is_empty() {
            return Err(CredentialError::invalid_operation(format!(
                "Target must be specified to {} a credential.",
                action
            )));
        }
        Ok(())
    }

    /// Rejects secrets longer than the configured vault maximum
    pub fn check_secret_size(&self, record: &CredentialRecord) -> Result<()> {
        let size = record.with_secret(|secret| secret.utf16_len())?;
        let max = self.config.max_secret_utf16_units;
        if size > max {
            return Err(CredentialError::BlobTooLarge { size, max });
        }
        Ok(())
    }

    fn to_native(record: &CredentialRecord) -> Result<NativeCredential> {
        Ok(NativeCredential {
            target_name: record.target()?.to_string(),
            target_alias: record.domain()?.map(str::to_string),
            user_name: record.username()?.map(str::to_string),
            credential_blob: record.with_secret(|secret| secret.expose_with(encode_secret_blob))?,
            comment: record.comment()?.map(str::to_string),
            type_code: record.credential_type()?.code(),
            persist_code: record.persistence()?.code(),
            last_written: FileTime::default(),
        })
    }

    fn from_native(native: NativeCredential) -> Result<CredentialRecord> {
        let credential_type = CredentialType::from_code(native.type_code)?;
        let persistence = PersistenceType::from_code(native.persist_code)?;

        let mut record = CredentialRecord::with_key(native.target_name.clone(), credential_type);
        record.set_domain(native.target_alias.clone())?;
        record.set_username(native.user_name.clone())?;
        record.set_secret(&decode_secret_blob(&native.credential_blob))?;
        record.set_comment(native.comment.clone())?;
        record.set_persistence(persistence)?;
        record.stamp_last_write(native.last_written.to_utc());
        Ok(record)
    }

    /// Writes `record` to the vault under its `(target, type)`
    ///
    /// # Returns
    /// * `Ok(true)` - Written; the record's last-write time is now
    /// * `Ok(false)` - The vault rejected the write (see [`CredentialStore::last_failure`])
    /// * `Err(InvalidOperation)` - Empty target
    /// * `Err(BlobTooLarge)` - Secret above the configured maximum; the vault is not contacted
    pub fn write(&self, record: &mut CredentialRecord) -> Result<bool> {
        Self::require_target(record.target()?, "save")?;
        self.check_secret_size(record)?;

        let native = Self::to_native(record)?;
        debug!(
            cred_target = %native.target_name,
            kind = native.type_code,
            blob_size = native.blob_size(),
            "Writing credential to vault"
        );

        match self.vault.write(&native) {
            Ok(()) => {
                record.stamp_last_write(Utc::now());
                info!(cred_target = %native.target_name, "Credential saved");
                Ok(true)
            }
            Err(failure) => {
                self.record_failure(failure);
                Ok(false)
            }
        }
    }

    /// Reads the vault entry for `(target, kind)`
    ///
    /// # Returns
    /// * `Ok(Some(record))` - Entry found and decoded
    /// * `Ok(None)` - No entry, or the vault refused the read
    /// * `Err(InvalidOperation)` - Empty target
    /// * `Err(Encoding)` - The entry carries an unknown type or persistence code
    pub fn read(&self, target: &str, kind: CredentialType) -> Result<Option<CredentialRecord>> {
        Self::require_target(target, "load")?;

        match self.vault.read(target, kind) {
            Ok(Some(native)) => {
                debug!(
                    cred_target = target,
                    kind = %kind,
                    blob_size = native.blob_size(),
                    "Read credential from vault"
                );
                Self::from_native(native).map(Some)
            }
            Ok(None) => {
                debug!(cred_target = target, kind = %kind, "No credential found");
                Ok(None)
            }
            Err(failure) => {
                self.record_failure(failure);
                Ok(None)
            }
        }
    }

    /// Like [`CredentialStore::read`], but a missing entry is `NotFound`
    pub fn read_required(&self, target: &str, kind: CredentialType) -> Result<CredentialRecord> {
        self.read(target, kind)?.ok_or_else(|| CredentialError::NotFound {
            target: target.to_string(),
        })
    }

    /// Deletes the vault entry for `(target, kind)`
    ///
    /// # Returns
    /// * `Ok(true)` - Deleted
    /// * `Ok(false)` - No such entry, or the vault refused the delete
    /// * `Err(InvalidOperation)` - Empty target; the vault is not contacted
    pub fn delete(&self, target: &str, kind: CredentialType) -> Result<bool> {
        Self::require_target(target, "delete")?;

        match self.vault.delete(target, kind) {
            Ok(deleted) => {
                if deleted {
                    info!(cred_target = target, kind = %kind, "Credential deleted");
                } else {
                    debug!(cred_target = target, kind = %kind, "No credential to delete");
                }
                Ok(deleted)
            }
            Err(failure) => {
                self.record_failure(failure);
                Ok(false)
            }
        }
    }

    /// True if the vault currently holds `(target, kind)`
    ///
    /// Always a fresh read; nothing is cached.
    pub fn exists(&self, target: &str, kind: CredentialType) -> Result<bool> {
        Self::require_target(target, "check existence of")?;
        Ok(self.read(target, kind)?.is_some())
    }

    /// Lists target names matching `filter` (`prefix*`, an exact name, or all)
    pub fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>> {
        self.vault.enumerate(filter).map_err(|failure| {
            self.record_failure(failure.clone());
            CredentialError::from(failure)
        })
    }

    /// Loads every `kind` credential whose target matches `filter`
    ///
    /// Each target is read once even when it is stored under several types.
    /// Entries deleted between listing and reading are skipped.
    pub fn load_all(&self, filter: Option<&str>, kind: CredentialType) -> Result<Vec<CredentialRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for target in self.enumerate(filter)? {
            // One listing entry per (target, type); the read is per target.
            if !seen.insert(target.to_ascii_lowercase()) {
                continue;
            }
            if let Some(record) = self.read(&target, kind)? {
                records.push(record);
            }
        }
        debug!(count = records.len(), filter = ?filter, "Loaded credentials");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn store_with_vault() -> (CredentialStore, Arc<InMemoryVault>) {
        let vault = Arc::new(InMemoryVault::new());
        let store = CredentialStore::new(vault.clone(), VaultConfig::default());
        (store, vault)
    }

    #[test]
    fn test_write_then_read() {
        let (store, _) = store_with_vault();
        let mut record = CredentialRecord::with_credentials("app", "user", "pw!$");
        record.set_domain(Some("CORP".to_string())).unwrap();
        record.set_comment(Some("note".to_string())).unwrap();
        record.set_persistence(PersistenceType::LocalComputer).unwrap();

        assert!(store.write(&mut record).unwrap());
        assert!(record.last_write_time_utc().unwrap() > DateTime::<Utc>::MIN_UTC);

        let read = store.read("app", CredentialType::Generic).unwrap().unwrap();
        assert_eq!(read.username().unwrap(), Some("user"));
        assert_eq!(read.reveal_secret().unwrap().as_str(), "pw!$");
        assert_eq!(read.domain().unwrap(), Some("CORP"));
        assert_eq!(read.comment().unwrap(), Some("note"));
        assert_eq!(read.persistence().unwrap(), PersistenceType::LocalComputer);
        assert!(read.last_write_time_utc().unwrap() > DateTime::<Utc>::MIN_UTC);
        assert!(read.is_valid().unwrap());
    }

    #[test]
    fn test_blob_too_large_rejected_before_vault() {
        let (store, vault) = store_with_vault();
        let mut record = CredentialRecord::with_credentials("app", "user", &"x".repeat(513));
        let err = store.write(&mut record).unwrap_err();
        assert!(matches!(err, CredentialError::BlobTooLarge { size: 513, max: 512 }));
        assert_eq!(vault.call_count(), 0);

        record.set_secret(&"x".repeat(512)).unwrap();
        assert!(store.write(&mut record).unwrap());
    }

    #[test]
    fn test_limit_counts_utf16_units() {
        let (store, _) = store_with_vault();
        // Each musical symbol is two UTF-16 units.
        let mut record = CredentialRecord::with_credentials("app", "user", &"𝄞".repeat(257));
        assert!(matches!(
            store.write(&mut record),
            Err(CredentialError::BlobTooLarge { size: 514, .. })
        ));
    }

    #[test]
    fn test_empty_target_is_invalid_operation() {
        let (store, vault) = store_with_vault();
        let mut record = CredentialRecord::with_credentials("", "user", "pw");
        assert!(matches!(store.write(&mut record), Err(CredentialError::InvalidOperation { .. })));
        assert!(matches!(
            store.delete("", CredentialType::Generic),
            Err(CredentialError::InvalidOperation { .. })
        ));
        assert!(matches!(
            store.exists("", CredentialType::Generic),
            Err(CredentialError::InvalidOperation { .. })
        ));
        assert!(matches!(
            store.read("", CredentialType::Generic),
            Err(CredentialError::InvalidOperation { .. })
        ));
        assert_eq!(vault.call_count(), 0);
    }

    #[test]
    fn test_vault_rejection_returns_false_with_code() {
        let (store, vault) = store_with_vault();
        let mut record = CredentialRecord::with_credentials("app", "user", "pw");
        assert!(store.write(&mut record).unwrap());

        vault.set_read_only(true);
        let before = record.last_write_time_utc().unwrap();
        assert!(!store.write(&mut record).unwrap());
        assert_eq!(record.last_write_time_utc().unwrap(), before);
        assert!(!store.delete("app", CredentialType::Generic).unwrap());

        let failure = store.last_failure().unwrap();
        assert_eq!(failure.code, 5);
        assert!(failure.operation.contains("delete"));
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let (store, _) = store_with_vault();
        assert!(!store.delete("missing", CredentialType::Generic).unwrap());
        assert!(store.last_failure().is_none());
        assert!(matches!(
            store.read_required("missing", CredentialType::Generic),
            Err(CredentialError::NotFound { .. })
        ));
    }

    #[test]
    fn test_exists_round_trips_every_time() {
        let (store, vault) = store_with_vault();
        assert!(!store.exists("app", CredentialType::Generic).unwrap());
        let mut record = CredentialRecord::with_credentials("app", "user", "pw");
        store.write(&mut record).unwrap();
        let calls = vault.call_count();
        assert!(store.exists("app", CredentialType::Generic).unwrap());
        assert!(store.exists("app", CredentialType::Generic).unwrap());
        assert_eq!(vault.call_count(), calls + 2);
        assert!(!store.exists("app", CredentialType::DomainPassword).unwrap());
    }

    #[test]
    fn test_read_decodes_foreign_records() {
        let (store, vault) = store_with_vault();
        let mut blob = encode_secret_blob("pw").to_vec();
        blob.push(0x7F);
        vault.insert_raw(NativeCredential {
            target_name: "legacy".to_string(),
            target_alias: None,
            user_name: None,
            credential_blob: zeroize::Zeroizing::new(blob),
            comment: None,
            type_code: 1,
            persist_code: 3,
            last_written: FileTime(116_444_736_000_000_000),
        });

        let read = store.read("legacy", CredentialType::Generic).unwrap().unwrap();
        assert_eq!(read.reveal_secret().unwrap().as_str(), "pw");
        assert_eq!(read.persistence().unwrap(), PersistenceType::Enterprise);
        assert_eq!(read.last_write_time_utc().unwrap().timestamp(), 0);
        assert!(!read.is_valid().unwrap());
    }

    #[test]
    fn test_read_rejects_unknown_codes() {
        let (store, vault) = store_with_vault();
        vault.insert_raw(NativeCredential {
            target_name: "odd".to_string(),
            target_alias: None,
            user_name: None,
            credential_blob: zeroize::Zeroizing::new(Vec::new()),
            comment: None,
            type_code: 1,
            persist_code: 9,
            last_written: FileTime::default(),
        });
        assert!(matches!(
            store.read("odd", CredentialType::Generic),
            Err(CredentialError::Encoding { .. })
        ));
    }

    #[test]
    fn test_enumerate_and_load_all() {
        let (store, _) = store_with_vault();
        for host in ["server01", "server02"] {
            let mut record = CredentialRecord::with_credentials(format!("TERMSRV/{}", host), "admin", "pw");
            store.write(&mut record).unwrap();
        }
        let mut other = CredentialRecord::with_credentials("credvault", "user", "pw");
        store.write(&mut other).unwrap();

        let mut targets = store.enumerate(Some("TERMSRV/*")).unwrap();
        targets.sort();
        assert_eq!(targets, vec!["TERMSRV/server01", "TERMSRV/server02"]);

        let records = store.load_all(Some("TERMSRV/*"), CredentialType::Generic).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.username().unwrap() == Some("admin")));
        assert_eq!(store.load_all(None, CredentialType::DomainPassword).unwrap().len(), 0);
    }

    #[test]
    fn test_load_all_reads_each_target_once() {
        let (store, _) = store_with_vault();
        let mut generic = CredentialRecord::with_credentials("app", "user", "pw");
        store.write(&mut generic).unwrap();
        let mut domain = CredentialRecord::with_credentials("APP", "CORP\\user", "pw");
        domain.set_credential_type(CredentialType::DomainPassword).unwrap();
        store.write(&mut domain).unwrap();
        assert_eq!(store.enumerate(None).unwrap().len(), 2);

        let records = store.load_all(None, CredentialType::Generic).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username().unwrap(), Some("user"));

        let records = store.load_all(None, CredentialType::DomainPassword).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username().unwrap(), Some("CORP\\user"));
    }

    #[test]
    fn test_secret_with_trailing_nul_round_trips() {
        let (store, _) = store_with_vault();
        let mut record = CredentialRecord::with_credentials("app", "user", "pw\0");
        assert!(store.write(&mut record).unwrap());
        let read = store.read("app", CredentialType::Generic).unwrap().unwrap();
        assert_eq!(read.reveal_secret().unwrap().as_str(), "pw\0");
        assert_eq!(read.secret_len().unwrap(), 3);
    }

    #[test]
    fn test_custom_limit_from_config() {
        let config = VaultConfig {
            max_secret_utf16_units: 4,
            ..VaultConfig::default()
        };
        let store = CredentialStore::new(Arc::new(InMemoryVault::new()), config);
        let mut record = CredentialRecord::with_credentials("app", "user", "12345");
        assert!(matches!(store.write(&mut record), Err(CredentialError::BlobTooLarge { max: 4, .. })));
    }
}
