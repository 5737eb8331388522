use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares closing a descriptor through the ring.
  pub fn prepare_close(&self, fd: RawFd) -> Result<u64, RingError> {
    // SAFETY: close references no user memory.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Close);
        sqe.fd = fd;
      })
    }
  }

  /// Closes `fd`, blocking until the kernel confirms.
  pub fn close_fd(&self, fd: RawFd) -> Result<(), RingError> {
    let tag = self.prepare_close(fd)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
