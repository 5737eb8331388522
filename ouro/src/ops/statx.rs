use std::ffi::CStr;
use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a statx. The path must already be NUL-terminated; taking
  /// it as a `&CStr` makes the caller keep an allocation whose lifetime
  /// spans the operation.
  ///
  /// # Safety
  /// `path` and `out` must stay valid and unmoved until the completion
  /// for the returned tag has been observed.
  pub unsafe fn prepare_statx(
    &self,
    dirfd: RawFd,
    path: &CStr,
    flags: i32,
    mask: u32,
    out: *mut libc::statx,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Statx);
      sqe.fd = dirfd;
      sqe.addr = path.as_ptr() as u64;
      sqe.len = mask;
      sqe.off = out as u64;
      sqe.op_flags = flags as u32;
    })
  }

  /// Runs statx for `path` relative to `dirfd`, blocking until the
  /// result buffer is filled.
  pub fn statx(
    &self,
    dirfd: RawFd,
    path: &CStr,
    flags: i32,
    mask: u32,
    out: &mut libc::statx,
  ) -> Result<(), RingError> {
    // SAFETY: path and out are borrowed for this whole call, past the
    // wait.
    let tag =
      unsafe { self.prepare_statx(dirfd, path, flags, mask, out)? };
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
