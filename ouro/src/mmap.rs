use std::{io, os::fd::RawFd, ptr};

use crate::error::RingError;

/// A shared mapping of one of the ring regions. Unmapped on drop.
pub(crate) struct Mmap {
  ptr: *mut libc::c_void,
  len: usize,
}

// SAFETY: the mapping is plain shared memory; all concurrent access to it
// goes through the atomic views built on top of it.
unsafe impl Send for Mmap {}
// SAFETY: see above.
unsafe impl Sync for Mmap {}

impl Mmap {
  /// Maps `len` bytes of the ring fd at one of the fixed region offsets.
  pub fn map(fd: RawFd, len: usize, offset: i64) -> Result<Mmap, RingError> {
    // SAFETY: a fresh anonymous address is requested; the kernel validates
    // fd/offset/len and returns MAP_FAILED on any mismatch.
    let ptr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED | libc::MAP_POPULATE,
        fd,
        offset,
      )
    };
    if ptr == libc::MAP_FAILED {
      return Err(RingError::Mmap(io::Error::last_os_error()));
    }
    Ok(Mmap { ptr, len })
  }

  pub fn as_ptr(&self) -> *mut u8 {
    self.ptr.cast()
  }
}

impl Drop for Mmap {
  fn drop(&mut self) {
    // SAFETY: ptr/len came from a successful mmap and are unmapped exactly
    // once.
    unsafe {
      libc::munmap(self.ptr, self.len);
    }
  }
}
