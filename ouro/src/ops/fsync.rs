use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;
use crate::sys;

impl Ring {
  /// Prepares an fsync. `flags` takes the kernel fsync flags
  /// ([`sys::FSYNC_DATASYNC`] being the only defined one).
  pub fn prepare_fsync(
    &self,
    fd: RawFd,
    flags: u32,
  ) -> Result<u64, RingError> {
    // SAFETY: fsync references no user memory.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Fsync);
        sqe.fd = fd;
        sqe.op_flags = flags;
      })
    }
  }

  /// Flushes file data and metadata, blocking until complete.
  pub fn fsync(&self, fd: RawFd) -> Result<(), RingError> {
    let tag = self.prepare_fsync(fd, 0)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }

  /// Flushes file data only, blocking until complete.
  pub fn fdatasync(&self, fd: RawFd) -> Result<(), RingError> {
    let tag = self.prepare_fsync(fd, sys::FSYNC_DATASYNC)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
