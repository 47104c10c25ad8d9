//! Page locking for secret buffers
//!
//! Keeps secret buffers out of swap where the platform allows it.
//! `mlock`/`munlock` on Unix, `VirtualLock`/`VirtualUnlock` on Windows,
//! a no-op elsewhere. Callers treat failure as non-fatal: the per-process
//! lock quota (RLIMIT_MEMLOCK, working-set size) is often small.
//!
//! Locks apply to whole pages. [`LockedPages`] therefore owns its pages
//! outright, so unlocking one buffer never unlocks memory another buffer
//! still relies on.

use once_cell::sync::Lazy;
use std::alloc::{self, Layout};
use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;
use zeroize::Zeroize;

static PAGE_SIZE: Lazy<usize> = Lazy::new(query_page_size);

#[cfg(unix)]
fn query_page_size() -> usize {
    // SAFETY: _SC_PAGESIZE is a valid sysconf name; -1 is handled below.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[cfg(windows)]
fn query_page_size() -> usize {
    use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    let mut info = SYSTEM_INFO::default();
    // SAFETY: GetSystemInfo only fills the structure it is given.
    unsafe { GetSystemInfo(&mut info) };
    match info.dwPageSize as usize {
        0 => 4096,
        size => size,
    }
}

#[cfg(not(any(unix, windows)))]
fn query_page_size() -> usize {
    4096
}

/// Size of one virtual memory page
pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// Lock `len` bytes starting at `ptr` into physical memory
#[cfg(unix)]
pub fn lock(ptr: *const u8, len: usize) -> io::Result<()> {
    if len == 0 {
        return Ok(());
    }
    // SAFETY: mlock only inspects the address range; the caller owns it.
    let result = unsafe { libc::mlock(ptr as *const c_void, len) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Undo [`lock`]
#[cfg(unix)]
pub fn unlock(ptr: *const u8, len: usize) -> io::Result<()> {
    if len == 0 {
        return Ok(());
    }
    // SAFETY: see `lock`.
    let result = unsafe { libc::munlock(ptr as *const c_void, len) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Lock `len` bytes starting at `ptr` into the working set
#[cfg(windows)]
pub fn lock(ptr: *const u8, len: usize) -> io::Result<()> {
    use windows::Win32::System::Memory::VirtualLock;

    if len == 0 {
        return Ok(());
    }
    // SAFETY: VirtualLock only inspects the address range; the caller owns it.
    unsafe { VirtualLock(ptr as *const c_void, len) }
        .map_err(|e| io::Error::from_raw_os_error(e.code().0 & 0xFFFF))
}

/// Undo [`lock`]
#[cfg(windows)]
pub fn unlock(ptr: *const u8, len: usize) -> io::Result<()> {
    use windows::Win32::System::Memory::VirtualUnlock;

    if len == 0 {
        return Ok(());
    }
    // SAFETY: see `lock`.
    unsafe { VirtualUnlock(ptr as *const c_void, len) }
        .map_err(|e| io::Error::from_raw_os_error(e.code().0 & 0xFFFF))
}

#[cfg(not(any(unix, windows)))]
pub fn lock(_ptr: *const u8, _len: usize) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "memory locking unavailable"))
}

#[cfg(not(any(unix, windows)))]
pub fn unlock(_ptr: *const u8, _len: usize) -> io::Result<()> {
    Ok(())
}

fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

/// Zeroed, page-aligned allocation of whole pages, locked where possible
///
/// No other allocation shares its pages. Dropping it zeroes the memory,
/// unlocks it and frees it.
pub struct LockedPages {
    ptr: NonNull<u8>,
    layout: Layout,
    lock_error: Option<io::Error>,
}

// The allocation is exclusively owned and only reachable through &self/&mut self.
unsafe impl Send for LockedPages {}
unsafe impl Sync for LockedPages {}

impl LockedPages {
    /// Allocates at least `min_len` bytes (at least one page) and tries to lock them
    pub fn new(min_len: usize) -> Self {
        let page = page_size();
        let len = min_len
            .max(1)
            .checked_next_multiple_of(page)
            .unwrap_or_else(|| capacity_overflow());
        let layout = Layout::from_size_align(len, page).unwrap_or_else(|_| capacity_overflow());

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        let lock_error = lock(ptr.as_ptr(), len).err();

        LockedPages { ptr, layout, lock_error }
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// True when the pages are locked into memory
    pub fn is_locked(&self) -> bool {
        self.lock_error.is_none()
    }

    /// Why locking failed, if it did
    pub fn lock_error(&self) -> Option<&io::Error> {
        self.lock_error.as_ref()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() initialized (zeroed) bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for LockedPages {
    fn drop(&mut self) {
        self.as_mut_slice().zeroize();
        if self.is_locked() {
            // Nothing sensible to do on failure; the memory is zeroed either way.
            let _ = unlock(self.ptr.as_ptr(), self.layout.size());
        }
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_length_is_noop() {
        let buf = [0u8; 0];
        #[cfg(any(unix, windows))]
        assert!(lock(buf.as_ptr(), 0).is_ok());
        assert!(unlock(buf.as_ptr(), 0).is_ok());
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(page_size().is_power_of_two());
    }

    #[test]
    fn test_locked_pages_cover_whole_pages() {
        let page = page_size();
        for min_len in [0, 1, 64, page, page + 1] {
            let pages = LockedPages::new(min_len);
            assert_eq!(pages.as_ptr() as usize % page, 0);
            assert_eq!(pages.len() % page, 0);
            assert!(pages.len() >= min_len.max(1));
            assert!(pages.as_slice().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_neighbouring_buffers_never_share_a_page() {
        let page = page_size();
        let buffers: Vec<LockedPages> = (0..8).map(|_| LockedPages::new(64)).collect();
        let mut first_pages: Vec<usize> = buffers.iter().map(|b| b.as_ptr() as usize / page).collect();
        first_pages.sort_unstable();
        first_pages.dedup();
        assert_eq!(first_pages.len(), buffers.len());
    }

    /// `Locked:` kB of the /proc/self/smaps mapping that contains `addr`
    #[cfg(target_os = "linux")]
    fn locked_kb_at(addr: usize) -> Option<u64> {
        let smaps = std::fs::read_to_string("/proc/self/smaps").ok()?;
        let mut inside = false;
        for line in smaps.lines() {
            let first = line.split_whitespace().next().unwrap_or("");
            if let Some((start, end)) = first.split_once('-') {
                if let (Ok(start), Ok(end)) = (usize::from_str_radix(start, 16), usize::from_str_radix(end, 16)) {
                    inside = (start..end).contains(&addr);
                    continue;
                }
            }
            if inside {
                if let Some(rest) = line.strip_prefix("Locked:") {
                    return rest.trim().trim_end_matches("kB").trim().parse().ok();
                }
            }
        }
        None
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dropping_a_neighbour_keeps_pages_locked() {
        let mut buffers: Vec<LockedPages> = (0..4).map(|_| LockedPages::new(64)).collect();
        if !buffers.iter().all(LockedPages::is_locked) {
            // RLIMIT_MEMLOCK too small on this host.
            return;
        }
        drop(buffers.remove(0));

        for survivor in &buffers {
            let locked = locked_kb_at(survivor.as_ptr() as usize).unwrap();
            assert!(locked > 0, "pages at {:p} were unlocked", survivor.as_ptr());
        }
    }
}
