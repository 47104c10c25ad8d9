//! Native vault record shape
//!
//! `NativeCredential` mirrors the fields of the OS credential record
//! (`CREDENTIALW` on Windows) that credvault reads and writes. Translation
//! between it and `CredentialRecord` lives in the store; the helpers here
//! handle the two encodings the vault imposes: UTF-16LE secret blobs and
//! FILETIME timestamps.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use tracing::warn;
use zeroize::Zeroizing;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01 (Unix epoch)
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// One vault entry in the vault's own terms
#[derive(Clone)]
pub struct NativeCredential {
    pub target_name: String,
    pub target_alias: Option<String>,
    pub user_name: Option<String>,
    /// UTF-16LE secret bytes; `CredentialBlobSize` is its length
    pub credential_blob: Zeroizing<Vec<u8>>,
    pub comment: Option<String>,
    pub type_code: u32,
    pub persist_code: u32,
    pub last_written: FileTime,
}

impl NativeCredential {
    /// `CredentialBlobSize` as the vault sees it
    pub fn blob_size(&self) -> usize {
        self.credential_blob.len()
    }
}

impl fmt::Debug for NativeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCredential")
            .field("target_name", &self.target_name)
            .field("target_alias", &self.target_alias)
            .field("user_name", &self.user_name)
            .field("credential_blob", &format_args!("[REDACTED, {} bytes]", self.blob_size()))
            .field("comment", &self.comment)
            .field("type_code", &self.type_code)
            .field("persist_code", &self.persist_code)
            .field("last_written", &self.last_written)
            .finish()
    }
}

/// 100-nanosecond ticks since 1601-01-01 UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FileTime(pub u64);

impl FileTime {
    /// Builds a FILETIME from its two native halves
    pub fn from_parts(low: u32, high: u32) -> Self {
        FileTime(((high as u64) << 32) | low as u64)
    }

    /// Splits into `(dwLowDateTime, dwHighDateTime)`
    pub fn to_parts(self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }

    /// Current time as a FILETIME
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Converts a UTC instant
    ///
    /// Instants before 1601 clamp to zero, instants past the FILETIME range
    /// saturate to `u64::MAX`.
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        let secs = instant.timestamp() + FILETIME_UNIX_OFFSET_SECS;
        if secs < 0 {
            return FileTime(0);
        }
        let ticks = (secs as u64)
            .checked_mul(TICKS_PER_SECOND as u64)
            .and_then(|ticks| ticks.checked_add((instant.timestamp_subsec_nanos() / 100) as u64))
            .unwrap_or(u64::MAX);
        FileTime(ticks)
    }

    /// Converts to a UTC instant
    pub fn to_utc(self) -> DateTime<Utc> {
        let ticks = self.0 as i64;
        let ticks = if ticks < 0 { i64::MAX } else { ticks };
        let secs = ticks / TICKS_PER_SECOND - FILETIME_UNIX_OFFSET_SECS;
        let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Encodes a secret as a UTF-16LE blob without terminator
pub fn encode_secret_blob(plaintext: &str) -> Zeroizing<Vec<u8>> {
    let mut blob = Zeroizing::new(Vec::with_capacity(plaintext.len() * 2));
    for unit in plaintext.encode_utf16() {
        blob.extend_from_slice(&unit.to_le_bytes());
    }
    blob
}

/// Decodes a UTF-16LE secret blob
///
/// Exactly `blob.len() / 2` code units are decoded, NULs included, so any
/// secret written by [`encode_secret_blob`] reads back unchanged. An odd
/// trailing byte is dropped and unpaired surrogates are replaced rather than
/// failing the read.
pub fn decode_secret_blob(blob: &[u8]) -> Zeroizing<String> {
    if blob.len() % 2 != 0 {
        warn!(blob_size = blob.len(), "Credential blob has odd length, dropping trailing byte");
    }
    let units: Zeroizing<Vec<u16>> = Zeroizing::new(
        blob.chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect(),
    );
    Zeroizing::new(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_unix_epoch() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let ft = FileTime::from_utc(epoch);
        assert_eq!(ft.0, 116_444_736_000_000_000);
        assert_eq!(ft.to_utc(), epoch);
    }

    #[test]
    fn test_filetime_parts() {
        let ft = FileTime(0x01D9_0000_1234_5678);
        let (low, high) = ft.to_parts();
        assert_eq!(low, 0x1234_5678);
        assert_eq!(high, 0x01D9_0000);
        assert_eq!(FileTime::from_parts(low, high), ft);
    }

    #[test]
    fn test_filetime_keeps_sub_second_ticks() {
        let instant = Utc.timestamp_opt(1_700_000_000, 123_456_700).unwrap();
        assert_eq!(FileTime::from_utc(instant).to_utc(), instant);
    }

    #[test]
    fn test_filetime_before_1601_clamps() {
        assert_eq!(FileTime::from_utc(DateTime::<Utc>::MIN_UTC), FileTime(0));
        let start = FileTime(0).to_utc();
        assert_eq!(start.timestamp(), -FILETIME_UNIX_OFFSET_SECS);
    }

    #[test]
    fn test_blob_encoding() {
        let blob = encode_secret_blob("ab");
        assert_eq!(blob.as_slice(), &[b'a', 0, b'b', 0]);
        assert_eq!(decode_secret_blob(&blob).as_str(), "ab");
    }

    #[test]
    fn test_blob_non_ascii() {
        let blob = encode_secret_blob("pä€𝄞");
        assert_eq!(blob.len(), 10);
        assert_eq!(decode_secret_blob(&blob).as_str(), "pä€𝄞");
    }

    #[test]
    fn test_decode_odd_length_blob() {
        let decoded = decode_secret_blob(&[b'o', 0, b'k', 0, 0x41]);
        assert_eq!(decoded.as_str(), "ok");
    }

    #[test]
    fn test_trailing_nul_survives_round_trip() {
        let blob = encode_secret_blob("pw\0");
        assert_eq!(blob.len(), 6);
        assert_eq!(decode_secret_blob(&blob).as_str(), "pw\0");
        assert_eq!(decode_secret_blob(&[]).as_str(), "");
    }

    #[test]
    fn test_filetime_far_future_saturates() {
        assert_eq!(FileTime::from_utc(DateTime::<Utc>::MAX_UTC), FileTime(u64::MAX));
        assert_eq!(FileTime(u64::MAX).to_utc().timestamp(), 910_692_730_085);
    }
}
