use std::os::fd::RawFd;

use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a one-shot poll for `events` (the `POLL*` bits) on `fd`.
  pub fn prepare_poll_add(
    &self,
    fd: RawFd,
    events: u32,
  ) -> Result<u64, RingError> {
    // SAFETY: poll-add references no user memory.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::PollAdd);
        sqe.fd = fd;
        sqe.op_flags = events;
      })
    }
  }

  /// Prepares removal of the armed poll identified by its tag.
  pub fn prepare_poll_remove(
    &self,
    target: u64,
  ) -> Result<u64, RingError> {
    // SAFETY: poll-remove carries only the target tag, by value.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::PollRemove);
        sqe.fd = -1;
        sqe.addr = target;
      })
    }
  }

  /// Waits for `events` on `fd`, returning the ready event mask.
  pub fn poll_add(
    &self,
    fd: RawFd,
    events: u32,
  ) -> Result<u32, RingError> {
    let tag = self.prepare_poll_add(fd, events)?;
    let (res, _flags) = self.wait(tag)?;
    Ok(RingError::check(res)? as u32)
  }

  /// Cancels an armed poll, blocking until the cancellation completes.
  pub fn poll_remove(&self, target: u64) -> Result<(), RingError> {
    let tag = self.prepare_poll_remove(target)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
