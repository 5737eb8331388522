use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a socket receive. `flags` takes the `MSG_*` bits.
  ///
  /// # Safety
  /// `buf` must stay valid and unmoved until the completion for the
  /// returned tag has been observed.
  pub unsafe fn prepare_recv(
    &self,
    fd: RawFd,
    buf: &mut [u8],
    flags: u32,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Recv);
      sqe.fd = fd;
      sqe.addr = buf.as_mut_ptr() as u64;
      sqe.len = buf.len() as u32;
      sqe.op_flags = flags;
    })
  }

  /// Receives into `buf` from a connected socket, blocking until data
  /// (or end of stream) arrives. Returns the number of bytes received.
  pub fn recv(
    &self,
    fd: RawFd,
    buf: &mut [u8],
    flags: u32,
  ) -> Result<usize, RingError> {
    // SAFETY: buf is borrowed for this whole call, past the wait.
    let tag = unsafe { self.prepare_recv(fd, buf, flags)? };
    let (res, _cqe_flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }
}
