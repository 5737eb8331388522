use std::net::SocketAddr;
use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ops::net_utils;
use crate::ring::Ring;

impl Ring {
  /// Prepares a connect to the given raw socket address.
  ///
  /// # Safety
  /// `addr` must stay valid and unmoved until the completion for the
  /// returned tag has been observed.
  pub unsafe fn prepare_connect(
    &self,
    fd: RawFd,
    addr: *const libc::sockaddr,
    addrlen: libc::socklen_t,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Connect);
      sqe.fd = fd;
      sqe.addr = addr as u64;
      sqe.off = addrlen as u64;
    })
  }

  /// Connects `fd` to `addr`, blocking until the handshake resolves.
  pub fn connect(
    &self,
    fd: RawFd,
    addr: &SocketAddr,
  ) -> Result<(), RingError> {
    let (storage, len) = net_utils::sockaddr_from(addr);
    // SAFETY: storage lives on this frame until the wait returns.
    let tag = unsafe {
      self.prepare_connect(
        fd,
        (&storage as *const libc::sockaddr_storage).cast(),
        len,
      )?
    };
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
