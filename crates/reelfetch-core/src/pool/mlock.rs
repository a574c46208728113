//! Pinning the arena in RAM (best effort).

/// Region pinned with `mlock`; unpinned when the pool goes away.
#[derive(Debug)]
pub(super) struct LockedRegion {
    addr: usize,
    len: usize,
}

impl LockedRegion {
    /// Try to `mlock` `[ptr, ptr + len)`. Returns `None` (and logs) when the
    /// kernel refuses, e.g. because RLIMIT_MEMLOCK is too small.
    #[cfg(unix)]
    pub(super) fn lock(ptr: *const u8, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let r = unsafe { libc::mlock(ptr as *const libc::c_void, len) };
        if r != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(bytes = len, error = %err, "mlock of block arena failed; continuing unpinned");
            return None;
        }
        tracing::debug!(bytes = len, "block arena pinned in memory");
        Some(Self {
            addr: ptr as usize,
            len,
        })
    }

    #[cfg(not(unix))]
    pub(super) fn lock(_ptr: *const u8, len: usize) -> Option<Self> {
        tracing::debug!(bytes = len, "memory locking not supported on this platform");
        None
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let r = unsafe { libc::munlock(self.addr as *const libc::c_void, self.len) };
            if r != 0 {
                tracing::debug!(errno = r, "munlock of block arena failed");
            }
        }
    }
}
