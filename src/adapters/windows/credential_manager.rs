//! Windows Credential Manager adapter
//!
//! Provides a safe Rust interface to the Windows Credential Manager API.
//! This module isolates all unsafe credential API calls behind
//! [`CredentialVault`].

use crate::adapters::native::{FileTime, NativeCredential};
use crate::adapters::CredentialVault;
use crate::core::CredentialType;
use crate::errors::{VaultFailure, ERROR_NOT_FOUND};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use tracing::debug;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::FILETIME;
use windows::Win32::Security::Credentials::{
    CredDeleteW, CredEnumerateW, CredFree, CredReadW, CredWriteW, CREDENTIALW,
    CRED_ENUMERATE_FLAGS, CRED_FLAGS, CRED_PERSIST, CRED_TYPE,
};
use zeroize::Zeroizing;

/// Win32 `ERROR_INVALID_DATA`, used when a stored string is not valid UTF-16
const ERROR_INVALID_DATA: u32 = 13;

/// Windows implementation of [`CredentialVault`]
///
/// Uses Windows Credential Manager (CredRead/CredWrite/CredDelete/CredEnumerate)
/// to store credentials encrypted by the OS.
pub struct WindowsCredentialVault;

impl WindowsCredentialVault {
    /// Creates a new Windows credential vault instance
    pub fn new() -> Self {
        WindowsCredentialVault
    }
}

impl Default for WindowsCredentialVault {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a string to a NUL-terminated UTF-16 buffer
fn to_wide(value: &str) -> Vec<u16> {
    OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn optional_pwstr(buffer: &Option<Vec<u16>>) -> PWSTR {
    buffer
        .as_ref()
        .map_or(PWSTR::null(), |wide| PWSTR(wide.as_ptr() as *mut u16))
}

/// Extracts the Win32 error code from an HRESULT-carrying error
fn native_code(error: &windows::core::Error) -> u32 {
    (error.code().0 as u32) & 0xFFFF
}

/// Frees a vault-allocated credential when dropped, whichever path returns
struct CredentialHandle(*mut CREDENTIALW);

impl Drop for CredentialHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from CredReadW and is freed exactly once.
            unsafe { CredFree(self.0 as *const _) };
        }
    }
}

/// Frees a vault-allocated credential array when dropped
struct CredentialListHandle(*mut *mut CREDENTIALW);

impl Drop for CredentialListHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from CredEnumerateW and is freed exactly once.
            unsafe { CredFree(self.0 as *const _) };
        }
    }
}

/// Reads an optional vault string
///
/// # Safety
/// `value` must be null or point to a NUL-terminated UTF-16 string.
unsafe fn read_pwstr(value: PWSTR, field: &str, target: &str) -> Result<Option<String>, VaultFailure> {
    if value.is_null() {
        return Ok(None);
    }
    value.to_string().map(Some).map_err(|_| {
        VaultFailure::new(
            format!("decode {} for target '{}'", field, target),
            ERROR_INVALID_DATA,
        )
    })
}

impl CredentialVault for WindowsCredentialVault {
    fn write(&self, credential: &NativeCredential) -> Result<(), VaultFailure> {
        // Convert strings to wide (UTF-16) format for Windows API
        let target_name = to_wide(&credential.target_name);
        let target_alias = credential.target_alias.as_deref().map(to_wide);
        let user_name = credential.user_name.as_deref().map(to_wide);
        let comment = credential.comment.as_deref().map(to_wide);

        let blob_ptr = if credential.credential_blob.is_empty() {
            std::ptr::null_mut()
        } else {
            credential.credential_blob.as_ptr() as *mut u8
        };

        // SAFETY: every pointer borrows a buffer that outlives the CredWriteW call
        let cred = CREDENTIALW {
            Flags: CRED_FLAGS(0),
            Type: CRED_TYPE(credential.type_code),
            TargetName: PWSTR(target_name.as_ptr() as *mut u16),
            Comment: optional_pwstr(&comment),
            LastWritten: FILETIME::default(),
            CredentialBlobSize: credential.blob_size() as u32, // Size in bytes
            CredentialBlob: blob_ptr,
            Persist: CRED_PERSIST(credential.persist_code),
            AttributeCount: 0,
            Attributes: std::ptr::null_mut(),
            TargetAlias: optional_pwstr(&target_alias),
            UserName: optional_pwstr(&user_name),
        };

        unsafe { CredWriteW(&cred, 0) }.map_err(|e| {
            VaultFailure::new(
                format!("write credential '{}'", credential.target_name),
                native_code(&e),
            )
        })
    }

    fn read(&self, target: &str, kind: CredentialType) -> Result<Option<NativeCredential>, VaultFailure> {
        let target_name = to_wide(target);
        let mut pcred: *mut CREDENTIALW = std::ptr::null_mut();

        let result = unsafe {
            CredReadW(
                PCWSTR::from_raw(target_name.as_ptr()),
                CRED_TYPE(kind.code()),
                0,
                &mut pcred,
            )
        };

        if let Err(e) = result {
            let code = native_code(&e);
            if code == ERROR_NOT_FOUND {
                // Credential not found is not an error, just return None
                return Ok(None);
            }
            return Err(VaultFailure::new(format!("read credential '{}'", target), code));
        }

        let handle = CredentialHandle(pcred);
        // SAFETY: pcred is valid after a successful CredReadW until the handle drops
        unsafe {
            let cred = &*handle.0;

            let credential_blob = if cred.CredentialBlob.is_null() || cred.CredentialBlobSize == 0 {
                Zeroizing::new(Vec::new())
            } else {
                Zeroizing::new(
                    std::slice::from_raw_parts(cred.CredentialBlob, cred.CredentialBlobSize as usize)
                        .to_vec(),
                )
            };

            let native = NativeCredential {
                target_name: read_pwstr(cred.TargetName, "target name", target)?
                    .unwrap_or_else(|| target.to_string()),
                target_alias: read_pwstr(cred.TargetAlias, "target alias", target)?,
                user_name: read_pwstr(cred.UserName, "username", target)?,
                credential_blob,
                comment: read_pwstr(cred.Comment, "comment", target)?,
                type_code: cred.Type.0,
                persist_code: cred.Persist.0,
                last_written: FileTime::from_parts(
                    cred.LastWritten.dwLowDateTime,
                    cred.LastWritten.dwHighDateTime,
                ),
            };

            debug!(cred_target = target, blob_size = native.blob_size(), "Read credential from Windows vault");
            Ok(Some(native))
        }
    }

    fn delete(&self, target: &str, kind: CredentialType) -> Result<bool, VaultFailure> {
        let target_name = to_wide(target);

        let result = unsafe {
            CredDeleteW(
                PCWSTR::from_raw(target_name.as_ptr()),
                CRED_TYPE(kind.code()),
                0,
            )
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if native_code(&e) == ERROR_NOT_FOUND => Ok(false),
            Err(e) => Err(VaultFailure::new(
                format!("delete credential '{}'", target),
                native_code(&e),
            )),
        }
    }

    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, VaultFailure> {
        let filter_wide = filter.map(to_wide);
        let filter_ptr = filter_wide
            .as_ref()
            .map_or(PCWSTR::null(), |wide| PCWSTR::from_raw(wide.as_ptr()));

        let mut count = 0u32;
        let mut pcredentials: *mut *mut CREDENTIALW = std::ptr::null_mut();

        let result = unsafe {
            CredEnumerateW(filter_ptr, CRED_ENUMERATE_FLAGS(0), &mut count, &mut pcredentials)
        };

        if let Err(e) = result {
            let code = native_code(&e);
            if code == ERROR_NOT_FOUND {
                // No credentials found, return empty list
                return Ok(Vec::new());
            }
            return Err(VaultFailure::new("enumerate credentials", code));
        }

        let handle = CredentialListHandle(pcredentials);
        // SAFETY: CredEnumerateW returned `count` valid credential pointers
        let targets = unsafe {
            std::slice::from_raw_parts(handle.0, count as usize)
                .iter()
                .filter_map(|cred_ptr| {
                    let cred = &**cred_ptr;
                    if cred.TargetName.is_null() {
                        None
                    } else {
                        cred.TargetName.to_string().ok()
                    }
                })
                .collect()
        };

        Ok(targets)
    }
}
