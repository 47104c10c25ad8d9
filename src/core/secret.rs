//! Protected in-memory secrets
//!
//! `ProtectedSecret` holds a password in page-aligned heap pages of its own
//! that are locked where possible and overwritten with zeros whenever its
//! content is replaced, cleared, or dropped.

use crate::adapters::memlock::LockedPages;
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// A secret held in locked, wipeable pages
///
/// # Security
///
/// - The buffer is zeroed before every replacement and on drop
/// - The buffer never shares a page with other data, so its lock cannot be
///   released by another secret going away
/// - Plaintext leaves the buffer only as a [`Zeroizing`] copy or through
///   [`ProtectedSecret::expose_with`]
/// - `Debug` and `Display` never reveal content
/// - Equality is constant-time over the content bytes; there is no `Hash`
///
/// # Example
///
/// ```
/// use credvault::ProtectedSecret;
///
/// let mut secret = ProtectedSecret::from_plaintext("hunter2");
/// assert_eq!(secret.reveal().as_str(), "hunter2");
///
/// secret.clear();
/// assert_eq!(secret.len(), 0);
/// ```
pub struct ProtectedSecret {
    pages: Option<LockedPages>,
    len: usize,
}

impl ProtectedSecret {
    /// Creates an empty secret; nothing is allocated until the first non-empty `set`
    pub fn new() -> Self {
        ProtectedSecret { pages: None, len: 0 }
    }

    /// Creates a secret holding `plaintext`
    pub fn from_plaintext(plaintext: &str) -> Self {
        let mut secret = Self::new();
        secret.set(plaintext);
        secret
    }

    /// Replaces the content with `plaintext`
    ///
    /// Prior content is wiped first. New pages are allocated only when
    /// `plaintext` does not fit in the current ones.
    pub fn set(&mut self, plaintext: &str) {
        let bytes = plaintext.as_bytes();
        let capacity = self.pages.as_ref().map_or(0, LockedPages::len);

        if bytes.len() > capacity {
            self.clear();
            let pages = LockedPages::new(bytes.len());
            if let Some(e) = pages.lock_error() {
                debug!(error = %e, capacity = pages.len(), "Secret buffer could not be page-locked");
            }
            self.pages = Some(pages);
        } else if let Some(pages) = self.pages.as_mut() {
            pages.as_mut_slice().zeroize();
        }

        if let Some(pages) = self.pages.as_mut() {
            pages.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
        }
        self.len = bytes.len();
    }

    fn bytes(&self) -> &[u8] {
        match &self.pages {
            Some(pages) => &pages.as_slice()[..self.len],
            None => &[],
        }
    }

    /// Returns a plaintext copy that is wiped when dropped
    ///
    /// Keep the copy only as long as needed.
    pub fn reveal(&self) -> Zeroizing<String> {
        Zeroizing::new(self.expose_with(str::to_owned))
    }

    /// Runs `f` against the plaintext without copying it out
    pub fn expose_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        // The buffer only ever holds bytes copied from a &str.
        match std::str::from_utf8(self.bytes()) {
            Ok(plaintext) => f(plaintext),
            Err(_) => f(""),
        }
    }

    /// Plaintext length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Plaintext length in UTF-16 code units, the unit vault limits use
    pub fn utf16_len(&self) -> usize {
        self.expose_with(|plaintext| plaintext.encode_utf16().count())
    }

    /// True when the content is held in locked pages
    pub fn is_locked(&self) -> bool {
        self.pages.as_ref().is_some_and(LockedPages::is_locked)
    }

    /// Overwrites and releases the buffer. Idempotent.
    pub fn clear(&mut self) {
        // Dropping the pages zeroes, unlocks and frees them.
        self.pages = None;
        self.len = 0;
    }

    /// Returns an independent duplicate with its own buffer
    pub fn copy(&self) -> Self {
        self.expose_with(Self::from_plaintext)
    }
}

impl Default for ProtectedSecret {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ProtectedSecret {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl PartialEq for ProtectedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes().ct_eq(other.bytes()).into()
    }
}

impl Eq for ProtectedSecret {}

impl Zeroize for ProtectedSecret {
    fn zeroize(&mut self) {
        self.clear();
    }
}

impl ZeroizeOnDrop for ProtectedSecret {}

impl Drop for ProtectedSecret {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for ProtectedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedSecret([REDACTED, {} bytes])", self.len)
    }
}

impl fmt::Display for ProtectedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for ProtectedSecret {
    fn from(plaintext: &str) -> Self {
        Self::from_plaintext(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_reveal() {
        let mut secret = ProtectedSecret::new();
        secret.set("testPassword!$*_?&");
        assert_eq!(secret.reveal().as_str(), "testPassword!$*_?&");
        assert_eq!(secret.len(), 18);
    }

    #[test]
    fn test_set_replaces_longer_content() {
        let mut secret = ProtectedSecret::from_plaintext("a much longer first password");
        secret.set("short");
        assert_eq!(secret.reveal().as_str(), "short");
        assert_eq!(secret.len(), 5);
    }

    #[test]
    fn test_set_grows_buffer() {
        let mut secret = ProtectedSecret::from_plaintext("short");
        let long = "x".repeat(300);
        secret.set(&long);
        assert_eq!(secret.reveal().as_str(), long);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut secret = ProtectedSecret::from_plaintext("secret");
        secret.clear();
        assert_eq!(secret.len(), 0);
        assert!(secret.is_empty());
        secret.clear();
        assert_eq!(secret.len(), 0);
        assert_eq!(secret.reveal().as_str(), "");
    }

    #[test]
    fn test_copy_is_independent() {
        let original = ProtectedSecret::from_plaintext("secret");
        let mut copy = original.copy();
        copy.clear();
        assert_eq!(original.reveal().as_str(), "secret");
        assert!(copy.is_empty());
    }

    #[test]
    fn test_constant_time_equality() {
        let a = ProtectedSecret::from_plaintext("secret");
        let b = ProtectedSecret::from_plaintext("secret");
        let c = ProtectedSecret::from_plaintext("secreT");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ProtectedSecret::new());
    }

    #[test]
    fn test_utf16_len() {
        let secret = ProtectedSecret::from_plaintext("pässwörd");
        assert_eq!(secret.utf16_len(), 8);
        assert_eq!(secret.len(), 10);
    }

    #[test]
    fn test_secrets_own_their_pages() {
        let page = crate::adapters::memlock::page_size();
        let secrets: Vec<ProtectedSecret> = (0..8).map(|i| ProtectedSecret::from_plaintext(&format!("secret-{}", i))).collect();
        let mut first_pages: Vec<usize> = secrets
            .iter()
            .map(|s| s.pages.as_ref().unwrap().as_ptr() as usize / page)
            .collect();
        first_pages.sort_unstable();
        first_pages.dedup();
        assert_eq!(first_pages.len(), secrets.len());
    }

    #[test]
    fn test_dropping_one_secret_keeps_the_others_intact() {
        let mut secrets: Vec<ProtectedSecret> = (0..4).map(|i| ProtectedSecret::from_plaintext(&format!("pw{}", i))).collect();
        let locked_before: Vec<bool> = secrets.iter().map(ProtectedSecret::is_locked).collect();
        drop(secrets.remove(0));
        for (i, secret) in secrets.iter().enumerate() {
            assert_eq!(secret.reveal().as_str(), format!("pw{}", i + 1));
            assert_eq!(secret.is_locked(), locked_before[i + 1]);
        }
    }

    #[test]
    fn test_empty_secret_allocates_nothing() {
        let mut secret = ProtectedSecret::from_plaintext("");
        assert!(secret.pages.is_none());
        assert!(!secret.is_locked());
        secret.set("x");
        secret.clear();
        assert!(secret.pages.is_none());
    }

    #[test]
    fn test_debug_does_not_leak() {
        let secret = ProtectedSecret::from_plaintext("secret123");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("secret123"));
        assert!(debug.contains("9 bytes"));
        assert_eq!(secret.to_string(), "[REDACTED]");
    }
}
