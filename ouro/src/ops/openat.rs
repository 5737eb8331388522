use std::ffi::CStr;
use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares opening `path` relative to `dirfd` (use
  /// `libc::AT_FDCWD` for the working directory).
  ///
  /// # Safety
  /// `path` must stay valid and unmoved until the completion for the
  /// returned tag has been observed.
  pub unsafe fn prepare_openat(
    &self,
    dirfd: RawFd,
    path: &CStr,
    flags: i32,
    mode: u32,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::OpenAt);
      sqe.fd = dirfd;
      sqe.addr = path.as_ptr() as u64;
      sqe.len = mode;
      sqe.op_flags = flags as u32;
    })
  }

  /// Opens a file through the ring, blocking until the descriptor is
  /// ready.
  pub fn openat(
    &self,
    dirfd: RawFd,
    path: &CStr,
    flags: i32,
    mode: u32,
  ) -> Result<RawFd, RingError> {
    // SAFETY: path is borrowed for this whole call, past the wait.
    let tag = unsafe { self.prepare_openat(dirfd, path, flags, mode)? };
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)
  }
}
