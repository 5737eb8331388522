use std::io::{IoSlice, IoSliceMut};
use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a positioned vectored read.
  ///
  /// # Safety
  /// The iovec list and every buffer it points at must stay valid and
  /// unmoved until the completion for the returned tag has been
  /// observed.
  pub unsafe fn prepare_readv(
    &self,
    fd: RawFd,
    iovecs: &[libc::iovec],
    offset: u64,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Readv);
      sqe.fd = fd;
      sqe.addr = iovecs.as_ptr() as u64;
      sqe.len = iovecs.len() as u32;
      sqe.off = offset;
    })
  }

  /// Prepares a positioned vectored write.
  ///
  /// # Safety
  /// Same contract as [`prepare_readv`](Self::prepare_readv).
  pub unsafe fn prepare_writev(
    &self,
    fd: RawFd,
    iovecs: &[libc::iovec],
    offset: u64,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Writev);
      sqe.fd = fd;
      sqe.addr = iovecs.as_ptr() as u64;
      sqe.len = iovecs.len() as u32;
      sqe.off = offset;
    })
  }

  /// Vectored read at `offset`, blocking until complete.
  pub fn readv_at(
    &self,
    fd: RawFd,
    bufs: &mut [IoSliceMut<'_>],
    offset: u64,
  ) -> Result<usize, RingError> {
    let iovecs: Vec<libc::iovec> = bufs
      .iter_mut()
      .map(|buf| libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
      })
      .collect();
    // SAFETY: iovecs and the borrowed buffers outlive the wait below.
    let tag = unsafe { self.prepare_readv(fd, &iovecs, offset)? };
    let (res, _flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }

  /// Vectored write at `offset`, blocking until complete.
  pub fn writev_at(
    &self,
    fd: RawFd,
    bufs: &[IoSlice<'_>],
    offset: u64,
  ) -> Result<usize, RingError> {
    let iovecs: Vec<libc::iovec> = bufs
      .iter()
      .map(|buf| libc::iovec {
        iov_base: buf.as_ptr() as *mut _,
        iov_len: buf.len(),
      })
      .collect();
    // SAFETY: iovecs and the borrowed buffers outlive the wait below.
    let tag = unsafe { self.prepare_writev(fd, &iovecs, offset)? };
    let (res, _flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as usize)
  }
}
