use std::mem;
use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares an accept on a listening socket. `addr`/`addrlen` receive
  /// the peer address and may be null.
  ///
  /// # Safety
  /// `addr` and `addrlen` must stay valid and unmoved until the
  /// completion for the returned tag has been observed.
  pub unsafe fn prepare_accept(
    &self,
    fd: RawFd,
    addr: *mut libc::sockaddr,
    addrlen: *mut libc::socklen_t,
    flags: u32,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Accept);
      sqe.fd = fd;
      sqe.addr = addr as u64;
      sqe.off = addrlen as u64;
      sqe.op_flags = flags;
    })
  }

  /// Accepts one connection, blocking until a peer arrives. Returns the
  /// connected descriptor (opened close-on-exec).
  pub fn accept(&self, fd: RawFd) -> Result<RawFd, RingError> {
    // SAFETY: all-zero is a valid representation for sockaddr_storage.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len =
      mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    // SAFETY: storage and len live on this frame until the wait returns.
    let tag = unsafe {
      self.prepare_accept(
        fd,
        (&mut storage as *mut libc::sockaddr_storage).cast(),
        &mut len,
        libc::SOCK_CLOEXEC as u32,
      )?
    };
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)
  }
}
