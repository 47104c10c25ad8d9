//! In-process credential vault
//!
//! Behaves like the Windows Credential Manager for the operations credvault
//! uses: entries keyed by case-insensitive target name plus type, vault-side
//! `LastWritten` stamping, the same blob size cap, and Win32 error codes on
//! rejection. Entries live only as long as the vault value.

use crate::adapters::native::{FileTime, NativeCredential};
use crate::adapters::{filter_matches, CredentialVault};
use crate::core::CredentialType;
use crate::errors::VaultFailure;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// `CRED_MAX_CREDENTIAL_BLOB_SIZE`
pub const MAX_NATIVE_BLOB_SIZE: usize = 5 * 512;

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;

/// Thread-safe in-memory implementation of [`CredentialVault`]
#[derive(Default)]
pub struct InMemoryVault {
    entries: Mutex<BTreeMap<(String, u32), NativeCredential>>,
    calls: AtomicUsize,
    read_only: AtomicBool,
}

impl InMemoryVault {
    /// Creates an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vault operations served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes writes and deletes fail with `ERROR_ACCESS_DENIED`
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Stores a raw entry as-is, bypassing validation and stamping
    ///
    /// Lets callers plant records another application might have written.
    pub fn insert_raw(&self, credential: NativeCredential) {
        let key = Self::key(&credential.target_name, credential.type_code);
        self.lock().insert(key, credential);
    }

    fn key(target: &str, type_code: u32) -> (String, u32) {
        (target.to_ascii_lowercase(), type_code)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, u32), NativeCredential>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, operation: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace!(operation, "In-memory vault call");
    }

    fn check_writable(&self, operation: &str) -> Result<(), VaultFailure> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(VaultFailure::new(operation, ERROR_ACCESS_DENIED));
        }
        Ok(())
    }
}

impl CredentialVault for InMemoryVault {
    fn write(&self, credential: &NativeCredential) -> Result<(), VaultFailure> {
        self.enter("write");
        let operation = format!("write credential '{}'", credential.target_name);
        self.check_writable(&operation)?;

        if credential.target_name.is_empty()
            || credential.blob_size() > MAX_NATIVE_BLOB_SIZE
            || !(1..=3).contains(&credential.persist_code)
        {
            return Err(VaultFailure::new(operation, ERROR_INVALID_PARAMETER));
        }

        let mut stored = credential.clone();
        stored.last_written = FileTime::now();
        let key = Self::key(&stored.target_name, stored.type_code);
        self.lock().insert(key, stored);
        Ok(())
    }

    fn read(&self, target: &str, kind: CredentialType) -> Result<Option<NativeCredential>, VaultFailure> {
        self.enter("read");
        Ok(self.lock().get(&Self::key(target, kind.code())).cloned())
    }

    fn delete(&self, target: &str, kind: CredentialType) -> Result<bool, VaultFailure> {
        self.enter("delete");
        self.check_writable(&format!("delete credential '{}'", target))?;
        Ok(self.lock().remove(&Self::key(target, kind.code())).is_some())
    }

    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, VaultFailure> {
        self.enter("enumerate");
        Ok(self
            .lock()
            .values()
            .filter(|c| filter_matches(filter, &c.target_name))
            .map(|c| c.target_name.clone())
            .collect())
    }
}
