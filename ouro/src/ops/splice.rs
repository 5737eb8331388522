use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a splice of `len` bytes from `fd_in` to `fd_out`.
  ///
  /// Offsets travel by value inside the SQE; `None` means "use the
  /// descriptor's own file offset", which is mandatory for pipes. The
  /// auxiliary input descriptor rides in the SQE's opcode-specific tail.
  pub fn prepare_splice(
    &self,
    fd_in: RawFd,
    off_in: Option<u64>,
    fd_out: RawFd,
    off_out: Option<u64>,
    len: u32,
    flags: u32,
  ) -> Result<u64, RingError> {
    // SAFETY: splice references no user memory; both offsets are plain
    // values with u64::MAX standing in for "none".
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Splice);
        sqe.fd = fd_out;
        sqe.off = off_out.unwrap_or(u64::MAX);
        sqe.addr = off_in.unwrap_or(u64::MAX);
        sqe.len = len;
        sqe.op_flags = flags;
        sqe.splice_fd_in = fd_in;
      })
    }
  }

  /// Splices `len` bytes from `fd_in` to `fd_out`, blocking until
  /// complete. Returns the number of bytes moved.
  pub fn splice(
    &self,
    fd_in: RawFd,
    off_in: Option<u64>,
    fd_out: RawFd,
    off_out: Option<u64>,
    len: u32,
    flags: u32,
  ) -> Result<usize, RingError> {
    let tag =
      self.prepare_splice(fd_in, off_in, fd_out, off_out, len, flags)?;
    let (res, _flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }
}
