use std::time::Duration;

use crate::entry::{KernelTimespec, Opcode};
use crate::error::RingError;
use crate::ring::Ring;

impl Ring {
  /// Prepares a timeout that completes when `wait_nr` other completions
  /// have been posted or the timespec elapses, whichever comes first
  /// (`wait_nr` of 0 means deadline only).
  ///
  /// # Safety
  /// `ts` must stay valid and unmoved until the completion for the
  /// returned tag has been observed.
  pub unsafe fn prepare_timeout(
    &self,
    ts: &KernelTimespec,
    wait_nr: u64,
    flags: u32,
  ) -> Result<u64, RingError> {
    self.submit_with(|sqe| {
      sqe.set_opcode(Opcode::Timeout);
      sqe.fd = -1;
      sqe.addr = ts as *const KernelTimespec as u64;
      sqe.len = 1;
      sqe.off = wait_nr;
      sqe.op_flags = flags;
    })
  }

  /// Prepares cancellation of the armed timeout identified by its tag.
  pub fn prepare_timeout_remove(
    &self,
    target: u64,
  ) -> Result<u64, RingError> {
    // SAFETY: timeout-remove carries only the target tag, by value.
    unsafe {
      self.submit_with(|sqe| {
        sqe.set_opcode(Opcode::TimeoutRemove);
        sqe.fd = -1;
        sqe.addr = target;
      })
    }
  }

  /// Sleeps on the ring for `duration`. The timer firing is reported by
  /// the kernel as `ETIME`, which is success here.
  pub fn timeout(&self, duration: Duration) -> Result<(), RingError> {
    let ts = KernelTimespec::from(duration);
    // SAFETY: ts lives on this frame until the wait returns.
    let tag = unsafe { self.prepare_timeout(&ts, 0, 0)? };
    let (res, _flags) = self.wait(tag)?;
    if res < 0 && res != -libc::ETIME {
      RingError::check(res)?;
    }
    Ok(())
  }

  /// Cancels an armed timeout. `ENOENT` means it already fired.
  pub fn timeout_remove(&self, target: u64) -> Result<(), RingError> {
    let tag = self.prepare_timeout_remove(target)?;
    let (res, _flags) = self.wait(tag)?;
    RingError::check(res)?;
    Ok(())
  }
}
