use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares an fadvise hint (`POSIX_FADV_*`) for a file range.
  pub fn prepare_fadvise(
    &self,
    fd: RawFd,
    offset: u64,
    len: u32,
    advice: i32,
  ) -> Result<u64, RingError> {
    // SAFETY: fadvise references no user memory.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Fadvise);
        sqe.fd = fd;
        sqe.off = offset;
        sqe.len = len;
        sqe.op_flags = advice as u32;
      })
    }
  }

  /// Applies an fadvise hint, blocking until acknowledged.
  pub fn fadvise(
    &self,
    fd: RawFd,
    offset: u64,
    len: u32,
    advice: i32,
  ) -> Result<(), RingError> {
    let tag = self.prepare_fadvise(fd, offset, len, advice)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
