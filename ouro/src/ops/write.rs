use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a positioned write of `buf`.
  ///
  /// # Safety
  /// `buf` must stay valid and unmoved until the completion for the
  /// returned tag has been observed via [`Ring::wait`].
  pub unsafe fn prepare_write(
    &self,
    fd: RawFd,
    buf: &[u8],
    offset: u64,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Write);
      sqe.fd = fd;
      sqe.addr = buf.as_ptr() as u64;
      sqe.len = buf.len() as u32;
      sqe.off = offset;
    })
  }

  /// Prepares a positioned write through registered buffer `buf_index`.
  ///
  /// # Safety
  /// Same contract as [`prepare_write`](Self::prepare_write);
  /// additionally `buf` must lie inside the registered buffer named by
  /// `buf_index`.
  pub unsafe fn prepare_write_fixed(
    &self,
    fd: RawFd,
    buf: &[u8],
    offset: u64,
    buf_index: u16,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::WriteFixed);
      sqe.fd = fd;
      sqe.addr = buf.as_ptr() as u64;
      sqe.len = buf.len() as u32;
      sqe.off = offset;
      sqe.buf_index = buf_index;
    })
  }

  /// Writes `buf` at `offset`, blocking until the completion arrives.
  /// Returns the number of bytes written.
  pub fn write_at(
    &self,
    fd: RawFd,
    buf: &[u8],
    offset: u64,
  ) -> Result<usize, RingError> {
    // SAFETY: buf is borrowed for this whole call, past the wait.
    let tag = unsafe { self.prepare_write(fd, buf, offset)? };
    let (res, _flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }
}
