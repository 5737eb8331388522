use crate::entry::Opcode;
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Queues a no-op, returning its tag.
  pub fn prepare_nop(&self) -> Result<u64, RingError> {
    // SAFETY: a no-op references no user memory.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::Nop);
        sqe.fd = -1;
      })
    }
  }

  /// Submits a no-op and waits for its (zero) result.
  pub fn nop(&self) -> Result<(), RingError> {
    let tag = self.prepare_nop()?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
