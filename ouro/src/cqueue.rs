//! The completion side of the ring.

use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::entry::CompletionEntry;
use crate::sys::Params;

/// View over the mapped completion header and CQE array.
///
/// `tail` is advanced by the kernel as completions are posted; `head` is
/// advanced here, by the single consumer, and only ever forward.
pub(crate) struct CompletionQueue {
  head: *const AtomicU32,
  tail: *const AtomicU32,
  overflow: *const AtomicU32,
  cqes: *const CompletionEntry,
  mask: u32,
  entries: u32,
}

// SAFETY: shared words are only touched through atomics and the CQE array
// is read-only on this side, after an acquire on `tail`.
unsafe impl Send for CompletionQueue {}
// SAFETY: see above.
unsafe impl Sync for CompletionQueue {}

impl CompletionQueue {
  /// Builds the view from the mapped completion region.
  ///
  /// # Safety
  /// `ring` must be the base of the mapping whose offsets
  /// `params.cq_off` describes (the submit mapping when the kernel
  /// advertises the single-mmap feature), alive for the lifetime of the
  /// returned value.
  pub unsafe fn new(ring: *mut u8, params: &Params) -> CompletionQueue {
    let off = &params.cq_off;
    CompletionQueue {
      head: ring.add(off.head as usize).cast(),
      tail: ring.add(off.tail as usize).cast(),
      overflow: ring.add(off.overflow as usize).cast(),
      cqes: ring.add(off.cqes as usize).cast(),
      mask: *ring.add(off.ring_mask as usize).cast::<u32>(),
      entries: *ring.add(off.ring_entries as usize).cast::<u32>(),
    }
  }

  pub fn head(&self) -> u32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.head }.load(Ordering::Acquire)
  }

  pub fn tail(&self) -> u32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.tail }.load(Ordering::Acquire)
  }

  /// Completions the kernel could not post because the ring was full.
  pub fn overflow(&self) -> u32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.overflow }.load(Ordering::Acquire)
  }

  pub fn entries(&self) -> u32 {
    self.entries
  }

  /// Reads the CQE at a counter position. Valid only for positions in
  /// `head()..tail()` observed after the `tail` load.
  pub fn cqe_at(&self, counter: u32) -> CompletionEntry {
    // SAFETY: masking keeps the index inside the CQE array, and the
    // acquire on `tail` ordered the kernel's writes before this read.
    unsafe { ptr::read_volatile(self.cqes.add((counter & self.mask) as usize)) }
  }

  /// Hands consumed entries back to the kernel. `counter` must not exceed
  /// the last observed `tail`; head only moves forward.
  pub fn advance_to(&self, counter: u32) {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.head }.store(counter, Ordering::Release);
  }
}
