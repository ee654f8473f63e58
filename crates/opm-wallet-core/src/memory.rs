//! Process hardening for private key material
//!
//! - [`disable_core_dumps`] sets `RLIMIT_CORE` to zero so a crash never writes
//!   a decrypted key to disk.
//! - [`LockedKey`] keeps a fixed-size secret on the heap, `mlock`s the page so
//!   it is never swapped out, and zeroizes it on [`LockedKey::wipe`] or drop.
//!
//! Both measures are best effort. Containers and unprivileged users are often
//! not allowed to lock memory; that is logged and otherwise ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process.
///
/// Call once at startup, before any key material exists. Returns `true` if
/// core dumps are (now or already) disabled.
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        let ok = sys::disable_core_dumps();
        if !ok {
            CORE_DUMPS_DISABLED.store(false, Ordering::SeqCst);
        }
        ok
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention is not supported on this platform");
        CORE_DUMPS_DISABLED.store(false, Ordering::SeqCst);
        false
    }
}

/// Fixed-size secret pinned in RAM and zeroized when wiped or dropped.
pub struct LockedKey<const N: usize> {
    bytes: Box<[u8; N]>,
    locked: bool,
    wiped: bool,
}

impl<const N: usize> LockedKey<N> {
    /// Move `secret` into a locked buffer and zeroize the caller's copy.
    pub fn new(secret: &mut [u8; N]) -> Self {
        let mut bytes = Box::new([0u8; N]);
        let locked = lock_region(bytes.as_ptr(), N);
        bytes.copy_from_slice(secret);
        secret.zeroize();

        Self {
            bytes,
            locked,
            wiped: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Whether the page is actually pinned.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_wiped(&self) -> bool {
        self.wiped
    }

    /// Overwrite the secret with zeros now instead of waiting for drop.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
        self.wiped = true;
    }
}

impl<const N: usize> Drop for LockedKey<N> {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            unlock_region(self.bytes.as_ptr(), N);
        }
    }
}

impl<const N: usize> fmt::Debug for LockedKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedKey")
            .field("len", &N)
            .field("locked", &self.locked)
            .field("wiped", &self.wiped)
            .finish_non_exhaustive()
    }
}

fn lock_region(ptr: *const u8, len: usize) -> bool {
    if len == 0 {
        return true;
    }

    #[cfg(unix)]
    {
        // SAFETY: `ptr` is the start of a live heap allocation of `len` bytes
        // owned by the calling `LockedKey`.
        unsafe { sys::mlock(ptr, len) }
    }

    #[cfg(not(unix))]
    {
        let _ = ptr;
        log::warn!("mlock is not supported on this platform; key may be swappable");
        false
    }
}

fn unlock_region(ptr: *const u8, len: usize) {
    #[cfg(unix)]
    {
        // SAFETY: called from drop with the same region passed to `lock_region`.
        unsafe { sys::munlock(ptr, len) }
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
    }
}

#[cfg(unix)]
mod sys {
    pub fn disable_core_dumps() -> bool {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with a valid rlimit struct has no memory effects.
        let result = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
        if result != 0 {
            log::warn!(
                "failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    pub unsafe fn mlock(ptr: *const u8, len: usize) -> bool {
        if libc::mlock(ptr as *const libc::c_void, len) != 0 {
            log::warn!(
                "mlock of {} bytes failed, key may be swappable: {}",
                len,
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    pub unsafe fn munlock(ptr: *const u8, len: usize) {
        libc::munlock(ptr as *const libc::c_void, len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_core_dumps_does_not_panic() {
        // Sandboxed CI may refuse setrlimit
        let first = disable_core_dumps();
        if first {
            assert!(disable_core_dumps());
        }
    }

    #[test]
    fn test_locked_key_takes_ownership_of_secret() {
        let mut secret = [0xABu8; 32];
        let key = LockedKey::new(&mut secret);

        assert_eq!(secret, [0u8; 32], "caller copy must be zeroized");
        assert_eq!(key.as_bytes(), &[0xABu8; 32]);
        assert!(!key.is_wiped());
    }

    #[test]
    fn test_wipe_zeroizes_in_place() {
        let mut secret = [0x11u8; 32];
        let mut key = LockedKey::new(&mut secret);
        key.wipe();

        assert!(key.is_wiped());
        assert!(key.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_debug_hides_contents() {
        let mut secret = [0x42u8; 32];
        let key = LockedKey::new(&mut secret);
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("42"));
        assert!(!rendered.contains("66"));
    }
}
