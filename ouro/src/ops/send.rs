use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a socket send. `flags` takes the `MSG_*` bits.
  ///
  /// # Safety
  /// `buf` must stay valid and unmoved until the completion for the
  /// returned tag has been observed.
  pub unsafe fn prepare_send(
    &self,
    fd: RawFd,
    buf: &[u8],
    flags: u32,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Send);
      sqe.fd = fd;
      sqe.addr = buf.as_ptr() as u64;
      sqe.len = buf.len() as u32;
      sqe.op_flags = flags;
    })
  }

  /// Sends `buf` on a connected socket, blocking until complete.
  /// Returns the number of bytes sent.
  pub fn send(
    &self,
    fd: RawFd,
    buf: &[u8],
    flags: u32,
  ) -> Result<usize, RingError> {
    // SAFETY: buf is borrowed for this whole call, past the wait.
    let tag = unsafe { self.prepare_send(fd, buf, flags)? };
    let (res, _cqe_flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }
}
