//! The submission side of the ring: slot reservation, publication and the
//! guard that serializes kernel entry against in-progress fills.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use crate::entry::SubmitEntry;
use crate::sys::{self, Params};

/// View over the mapped submit header and SQE array.
///
/// `head` is advanced by the kernel as it consumes entries; `tail` is
/// advanced by producers, one CAS per reserved slot. Both are free-running
/// 32-bit counters; a slot index is a counter value masked with
/// `capacity - 1`.
pub(crate) struct SubmitQueue {
  head: *const AtomicU32,
  tail: *const AtomicU32,
  flags: *const AtomicU32,
  dropped: *const AtomicU32,
  /// Indirection array: position i names the SQE slot the kernel should
  /// read i-th.
  array: *const AtomicU32,
  sqes: *mut SubmitEntry,
  mask: u32,
  entries: u32,

  /// Number of reserved slots whose fill has not been published yet.
  writers: AtomicU32,
  /// Set while a kernel entry is in progress; no fill may start under it.
  entered: AtomicU32,
}

// SAFETY: every shared field is only touched through atomic operations;
// SQE slots are exclusively owned between reservation and publication.
unsafe impl Send for SubmitQueue {}
// SAFETY: see above.
unsafe impl Sync for SubmitQueue {}

impl SubmitQueue {
  /// Builds the view from the mapped submit region and SQE array.
  ///
  /// # Safety
  /// `ring` must be the base of the submit-ring mapping whose offsets
  /// `params.sq_off` describes, and `sqes` the base of the SQE-array
  /// mapping, both alive for the lifetime of the returned value.
  pub unsafe fn new(
    ring: *mut u8,
    params: &Params,
    sqes: *mut u8,
  ) -> SubmitQueue {
    let off = &params.sq_off;
    SubmitQueue {
      head: ring.add(off.head as usize).cast(),
      tail: ring.add(off.tail as usize).cast(),
      flags: ring.add(off.flags as usize).cast(),
      dropped: ring.add(off.dropped as usize).cast(),
      array: ring.add(off.array as usize).cast(),
      sqes: sqes.cast(),
      mask: *ring.add(off.ring_mask as usize).cast::<u32>(),
      entries: *ring.add(off.ring_entries as usize).cast::<u32>(),
      writers: AtomicU32::new(0),
      entered: AtomicU32::new(0),
    }
  }

  fn head_ref(&self) -> &AtomicU32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.head }
  }

  fn tail_ref(&self) -> &AtomicU32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.tail }
  }

  pub fn entries(&self) -> u32 {
    self.entries
  }

  /// Entries published but not yet consumed by the kernel.
  pub fn pending(&self) -> u32 {
    let tail = self.tail_ref().load(Ordering::Acquire);
    let head = self.head_ref().load(Ordering::Acquire);
    tail.wrapping_sub(head)
  }

  /// Submissions the kernel dropped because of a malformed indirection
  /// entry. Nonzero means a library bug.
  pub fn dropped(&self) -> u32 {
    // SAFETY: the pointer targets a live mapping; see `new`.
    unsafe { &*self.dropped }.load(Ordering::Acquire)
  }

  /// Whether an SQPOLL kernel thread went idle and wants a wakeup flag on
  /// the next enter.
  pub fn need_wakeup(&self) -> bool {
    // SAFETY: the pointer targets a live mapping; see `new`.
    let flags = unsafe { &*self.flags }.load(Ordering::Acquire);
    flags & sys::SQ_NEED_WAKEUP != 0
  }

  pub fn sqe_ptr(&self, value: u32) -> *mut SubmitEntry {
    // SAFETY: masking keeps the index inside the `entries`-sized array.
    unsafe { self.sqes.add((value & self.mask) as usize) }
  }

  /// Reserves the next SQE slot, spinning past a full ring and past an
  /// in-progress kernel entry. Returns the reserved tail counter value;
  /// the slot is `value & mask` and arrives reset.
  ///
  /// The writer token is taken *before* the tail CAS: once the CAS
  /// succeeds there exists a reserved-but-unfilled slot, and the enter
  /// guard must already be able to see it. Taking the token afterwards
  /// would leave a window in which an entry could hand the kernel an
  /// unwritten record.
  pub fn reserve(&self) -> u32 {
    loop {
      self.writers.fetch_add(1, Ordering::SeqCst);
      if self.entered.load(Ordering::SeqCst) != 0 {
        self.writers.fetch_sub(1, Ordering::SeqCst);
        thread::yield_now();
        continue;
      }

      let tail = self.tail_ref().load(Ordering::Acquire);
      let head = self.head_ref().load(Ordering::Acquire);
      if tail.wrapping_sub(head) >= self.entries {
        // Ring full; back off until the kernel consumes something.
        self.writers.fetch_sub(1, Ordering::SeqCst);
        thread::yield_now();
        continue;
      }

      if self
        .tail_ref()
        .compare_exchange(
          tail,
          tail.wrapping_add(1),
          Ordering::AcqRel,
          Ordering::Relaxed,
        )
        .is_ok()
      {
        // SAFETY: the CAS made this slot exclusively ours until publish.
        unsafe { (*self.sqe_ptr(tail)).reset() };
        return tail;
      }

      self.writers.fetch_sub(1, Ordering::SeqCst);
      thread::yield_now();
    }
  }

  /// Publishes a reserved slot: records it in the indirection array and
  /// releases the writer token taken by `reserve`.
  pub fn publish(&self, value: u32) {
    let idx = value & self.mask;
    // SAFETY: masking keeps the position inside the `entries`-sized
    // indirection array.
    unsafe { &*self.array.add(idx as usize) }.store(idx, Ordering::Release);
    self.writers.fetch_sub(1, Ordering::SeqCst);
  }

  /// Acquires the entry guard: blocks new fills from starting, then waits
  /// for every in-progress fill to publish.
  pub fn enter_lock(&self) {
    while self
      .entered
      .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      thread::yield_now();
    }
    while self.writers.load(Ordering::SeqCst) != 0 {
      thread::yield_now();
    }
  }

  pub fn enter_unlock(&self) {
    self.entered.store(0, Ordering::SeqCst);
  }
}
