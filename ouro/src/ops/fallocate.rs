use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares an fallocate of `len` bytes at `offset`. `mode` takes the
  /// `FALLOC_FL_*` bits. The length rides in the SQE address field, as
  /// the kernel reads it.
  pub fn prepare_fallocate(
    &self,
    fd: RawFd,
    mode: i32,
    offset: u64,
    len: u64,
  ) -> Result<u64, RingError> {
    // SAFETY: fallocate references no user memory; the address field
    // carries the length by value.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Fallocate);
        sqe.fd = fd;
        sqe.off = offset;
        sqe.len = mode as u32;
        sqe.addr = len;
      })
    }
  }

  /// Allocates file space, blocking until complete.
  pub fn fallocate(
    &self,
    fd: RawFd,
    mode: i32,
    offset: u64,
    len: u64,
  ) -> Result<(), RingError> {
    let tag = self.prepare_fallocate(fd, mode, offset, len)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
