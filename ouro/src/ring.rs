//! The ring handle: construction, the submission primitive, the
//! completion demultiplexer and teardown.

use std::collections::HashMap;
use std::io;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cqueue::CompletionQueue;
use crate::entry::{CompletionEntry, SubmitEntry};
use crate::error::RingError;
use crate::mmap::Mmap;
use crate::registry::{self, FileRegistry};
use crate::request::{Notify, Outcome, RecordPool};
use crate::squeue::SubmitQueue;
use crate::submitter::Submitter;
use crate::sync::Mutex;
use crate::sys::{self, Params};

/// How long the worker idles between shutdown checks when nothing is in
/// flight.
const IDLE_TICK: Duration = Duration::from_millis(10);

/// How a configured eventfd is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventfdMode {
  /// The worker blocks on the eventfd between completion drains.
  Blocking,
  /// The eventfd is only registered and exposed via
  /// [`Ring::event_fd`] for external polling; the worker keeps its
  /// backoff sleep.
  NonBlocking,
}

/// Construction-time configuration for a [`Ring`].
pub struct RingOptions {
  cq_entries: u32,
  flags: u32,
  sq_thread_cpu: u32,
  sq_thread_idle: u32,
  starting_tag: u64,
  eventfd: Option<EventfdMode>,
  on_enter_error: Option<Box<dyn Fn(io::Error) + Send + Sync>>,
  submit_deadline: Option<Duration>,
  backoff: Duration,
  file_registry: bool,
}

impl Default for RingOptions {
  fn default() -> Self {
    Self {
      cq_entries: 0,
      flags: 0,
      sq_thread_cpu: 0,
      sq_thread_idle: 0,
      starting_tag: 1,
      eventfd: None,
      on_enter_error: None,
      submit_deadline: None,
      backoff: Duration::from_nanos(200),
      file_registry: false,
    }
  }
}

impl RingOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Ask the kernel for a completion ring of `n` entries instead of the
  /// default (twice the submission capacity).
  pub fn cq_entries(mut self, n: u32) -> Self {
    self.cq_entries = n;
    self
  }

  /// Raw setup flags forwarded to the kernel.
  pub fn setup_flags(mut self, flags: u32) -> Self {
    self.flags |= flags;
    self
  }

  /// Enable submission-queue polling by a kernel thread.
  pub fn sqpoll(mut self, idle_ms: u32) -> Self {
    self.flags |= sys::SETUP_SQPOLL;
    self.sq_thread_idle = idle_ms;
    self
  }

  /// First value handed out by the tag counter. Clamped to at least 1;
  /// tag zero is reserved for untracked entries.
  pub fn starting_tag(mut self, tag: u64) -> Self {
    self.starting_tag = tag.max(1);
    self
  }

  /// Create and register an eventfd for completion notification.
  pub fn eventfd(mut self, mode: EventfdMode) -> Self {
    self.eventfd = Some(mode);
    self
  }

  /// Sink for enter-syscall failures observed by the background worker.
  pub fn on_enter_error(
    mut self,
    handler: impl Fn(io::Error) + Send + Sync + 'static,
  ) -> Self {
    self.on_enter_error = Some(Box::new(handler));
    self
  }

  /// Coalesce submissions in a background batcher and enter the ring at
  /// most once per deadline window.
  pub fn submit_deadline(mut self, deadline: Duration) -> Self {
    self.submit_deadline = Some(deadline);
    self
  }

  /// Sleep between completion drains when no eventfd is configured.
  pub fn backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Attach a [`FileRegistry`] to the ring at construction.
  pub fn file_registry(mut self) -> Self {
    self.file_registry = true;
    self
  }
}

/// Ring-level state shared between user handles and the worker threads.
///
/// Field order matters for teardown: the SQE array is unmapped first,
/// then the completion ring, then the submit ring, and the descriptor is
/// closed last.
pub(crate) struct Inner {
  sqe_mem: Mmap,
  cq_mem: Option<Mmap>,
  sq_mem: Mmap,
  fd: OwnedFd,

  params: Params,
  pub(crate) sq: SubmitQueue,
  cq: CompletionQueue,

  tag: AtomicU64,
  inflight: Mutex<HashMap<u64, Arc<crate::request::Record>>>,
  /// Registered operations whose CQE has not been delivered yet.
  pending: AtomicUsize,
  pool: RecordPool,
  notify: Notify,

  shutdown: AtomicBool,
  handles: AtomicUsize,
  worker: Mutex<Option<JoinHandle<()>>>,
  batcher: OnceLock<Submitter>,
  batched: bool,

  event_fd: Option<OwnedFd>,
  eventfd_blocking: bool,
  backoff: Duration,
  on_enter_error: Option<Box<dyn Fn(io::Error) + Send + Sync>>,
  files: Option<FileRegistry>,
}

impl Inner {
  pub(crate) fn sq_entries(&self) -> u32 {
    self.sq.entries()
  }

  /// Wakes the worker wherever it is parked: the notify flag covers the
  /// idle wait, the eventfd write covers a blocking completion read.
  pub(crate) fn wake_worker(&self) {
    self.notify.notify();
    if self.eventfd_blocking {
      self.write_eventfd();
    }
  }

  fn write_eventfd(&self) {
    if let Some(efd) = &self.event_fd {
      let one: u64 = 1;
      // SAFETY: writes 8 bytes from a stack value; bumping the eventfd
      // counter wakes a blocked reader.
      unsafe {
        libc::write(efd.as_raw_fd(), (&one as *const u64).cast(), 8);
      }
    }
  }

  /// Submission tick: routes to the deadline batcher when one is
  /// configured, otherwise wakes the worker directly.
  fn kick(&self) {
    if let Some(batcher) = self.batcher.get() {
      batcher.tick();
    } else {
      self.wake_worker();
    }
  }

  /// Creates the in-flight record for a tag. Must happen before the SQE
  /// becomes visible to the kernel so its completion can never race past
  /// the registration.
  fn register(&self, tag: u64) {
    let record = self.pool.get();
    let previous = self.inflight.lock().insert(tag, record);
    if previous.is_some() {
      // Tags from next_tag are unique; a collision means the caller
      // invented one.
      tracing::warn!(tag, "replaced an in-flight record with a reused tag");
    } else {
      self.pending.fetch_add(1, Ordering::AcqRel);
    }
  }

  /// Serializes against in-progress fills and hands the kernel every
  /// published entry. Enter failures go to the configured handler;
  /// completions already posted are drained by the caller regardless.
  pub(crate) fn enter_for_submit(&self) {
    let mut flags = sys::ENTER_GETEVENTS;
    if self.sq.need_wakeup() {
      flags |= sys::ENTER_SQ_WAKEUP;
    }
    self.sq.enter_lock();
    let to_submit = self.sq.pending();
    let res = sys::enter(self.fd.as_raw_fd(), to_submit, 0, flags);
    self.sq.enter_unlock();
    match res {
      Ok(consumed) => {
        tracing::trace!(to_submit, consumed, "ring entered");
      }
      Err(err) => {
        tracing::trace!(error = %err, "ring enter failed");
        if let Some(handler) = &self.on_enter_error {
          handler(err);
        }
      }
    }
  }

  /// Routes every observed CQE to its waiter and hands the consumed
  /// range back to the kernel. Unknown tags (stragglers from a shutdown
  /// race, or tag-zero entries) are consumed and dropped.
  fn drain(&self) -> u32 {
    let tail = self.cq.tail();
    let mut cursor = self.cq.head();
    if cursor == tail {
      return 0;
    }
    let mut consumed = 0u32;
    while cursor != tail {
      let cqe: CompletionEntry = self.cq.cqe_at(cursor);
      let record = {
        let map = self.inflight.lock();
        map.get(&cqe.user_data).cloned()
      };
      match record {
        Some(record) => {
          record.complete(cqe.res, cqe.flags);
          self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        None => {
          tracing::trace!(
            tag = cqe.user_data,
            res = cqe.res,
            "completion with no waiter"
          );
        }
      }
      cursor = cursor.wrapping_add(1);
      consumed += 1;
    }
    self.cq.advance_to(cursor);
    consumed
  }

  fn wait_for_completions(&self) {
    if self.eventfd_blocking {
      if let Some(efd) = &self.event_fd {
        let mut count = [0u8; 8];
        // SAFETY: reads the eventfd counter into an 8-byte stack buffer.
        let ret = unsafe {
          libc::read(efd.as_raw_fd(), count.as_mut_ptr().cast(), 8)
        };
        if ret < 0 {
          tracing::trace!(
            error = %io::Error::last_os_error(),
            "eventfd read failed"
          );
        }
        return;
      }
    }
    thread::sleep(self.backoff);
  }

  /// Fails every outstanding waiter with the shutdown outcome.
  fn fail_all(&self) {
    let drained: Vec<Arc<crate::request::Record>> = {
      let mut map = self.inflight.lock();
      map.drain().map(|(_, record)| record).collect()
    };
    let count = drained.len();
    for record in drained {
      record.fail_shutdown();
    }
    self.pending.store(0, Ordering::Release);
    if count > 0 {
      tracing::debug!(count, "failed outstanding operations at shutdown");
    }
  }

  fn close(&self) {
    if self.shutdown.swap(true, Ordering::AcqRel) {
      return;
    }
    tracing::debug!(fd = self.fd.as_raw_fd(), "ring closing");
    if let Some(batcher) = self.batcher.get() {
      batcher.stop();
    }
    self.notify.notify();
    self.write_eventfd();
    if let Some(handle) = self.worker.lock().take() {
      let _ = handle.join();
    }
    self.fail_all();
  }
}

fn worker_loop(inner: Arc<Inner>) {
  loop {
    if inner.shutdown.load(Ordering::Acquire) {
      return;
    }
    let waiters = inner.pending.load(Ordering::Acquire) > 0;
    if !waiters && inner.sq.pending() == 0 {
      inner.notify.wait_timeout(IDLE_TICK);
      continue;
    }
    if !inner.batched {
      inner.enter_for_submit();
    }
    inner.drain();
    if inner.shutdown.load(Ordering::Acquire) {
      return;
    }
    if inner.pending.load(Ordering::Acquire) > 0 {
      inner.wait_for_completions();
    } else if inner.batched && inner.sq.pending() > 0 {
      // Entries queued for the batcher; check back after its deadline.
      thread::sleep(inner.backoff);
    }
  }
}

/// A handle to one io_uring instance.
///
/// The handle is cheap to clone and safe to use from many threads at
/// once; all ring-level state lives behind it (nothing in this crate is
/// process-global, so multiple rings can coexist). The last handle to
/// drop closes the ring, failing any operations still in flight with
/// [`RingError::Shutdown`].
pub struct Ring {
  inner: Arc<Inner>,
}

impl Ring {
  /// Creates a ring with `entries` submission slots.
  ///
  /// `entries` must be a power of two in `1..=4096`. A background worker
  /// thread is spawned to enter the ring and deliver completions; it
  /// exits on [`close`](Self::close).
  pub fn new(
    entries: u32,
    options: RingOptions,
  ) -> Result<Ring, RingError> {
    if entries == 0 || entries > 4096 || !entries.is_power_of_two() {
      return Err(RingError::InvalidEntries);
    }

    let mut params = Params {
      flags: options.flags,
      sq_thread_cpu: options.sq_thread_cpu,
      sq_thread_idle: options.sq_thread_idle,
      ..Params::default()
    };
    if options.cq_entries > 0 {
      params.cq_entries = options.cq_entries;
      params.flags |= sys::SETUP_CQSIZE;
    }

    let raw_fd = sys::setup(entries, &mut params).map_err(RingError::Setup)?;
    // SAFETY: setup returned a fresh descriptor that is owned from here.
    let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };
    tracing::debug!(
      fd = raw_fd,
      sq_entries = params.sq_entries,
      cq_entries = params.cq_entries,
      features = params.features,
      "ring created"
    );

    let sq_size = params.sq_off.array as usize
      + params.sq_entries as usize * mem::size_of::<u32>();
    let cq_size = params.cq_off.cqes as usize
      + params.cq_entries as usize * mem::size_of::<CompletionEntry>();
    let single_mmap = params.features & sys::FEAT_SINGLE_MMAP != 0;

    let sq_len = if single_mmap { sq_size.max(cq_size) } else { sq_size };
    let sq_mem = Mmap::map(raw_fd, sq_len, sys::OFF_SQ_RING)?;
    let cq_mem = if single_mmap {
      None
    } else {
      Some(Mmap::map(raw_fd, cq_size, sys::OFF_CQ_RING)?)
    };
    let sqe_mem = Mmap::map(
      raw_fd,
      params.sq_entries as usize * mem::size_of::<SubmitEntry>(),
      sys::OFF_SQES,
    )?;

    // SAFETY: the mappings live in Inner next to the views built on them
    // and are unmapped only after the worker has exited.
    let sq = unsafe { SubmitQueue::new(sq_mem.as_ptr(), &params, sqe_mem.as_ptr()) };
    let cq_base = cq_mem.as_ref().map_or(sq_mem.as_ptr(), |m| m.as_ptr());
    // SAFETY: see above.
    let cq = unsafe { CompletionQueue::new(cq_base, &params) };

    let (event_fd, eventfd_blocking) = match options.eventfd {
      Some(mode) => {
        let efd =
          registry::new_eventfd(mode == EventfdMode::NonBlocking)?;
        registry::register_eventfd(raw_fd, efd.as_raw_fd())?;
        (Some(efd), mode == EventfdMode::Blocking)
      }
      None => (None, false),
    };

    let files = options.file_registry.then(|| FileRegistry::new(raw_fd));

    let inner = Arc::new(Inner {
      sqe_mem,
      cq_mem,
      sq_mem,
      fd,
      params,
      sq,
      cq,
      tag: AtomicU64::new(options.starting_tag),
      inflight: Mutex::new(HashMap::with_capacity(
        params.cq_entries as usize,
      )),
      pending: AtomicUsize::new(0),
      pool: RecordPool::new(),
      notify: Notify::new(),
      shutdown: AtomicBool::new(false),
      handles: AtomicUsize::new(1),
      worker: Mutex::new(None),
      batcher: OnceLock::new(),
      batched: options.submit_deadline.is_some(),
      event_fd,
      eventfd_blocking,
      backoff: options.backoff,
      on_enter_error: options.on_enter_error,
      files,
    });

    let worker_inner = Arc::clone(&inner);
    let handle = thread::Builder::new()
      .name("ouro-ring".into())
      .spawn(move || worker_loop(worker_inner))
      .map_err(RingError::Setup)?;
    *inner.worker.lock() = Some(handle);

    if let Some(deadline) = options.submit_deadline {
      match Submitter::spawn(Arc::clone(&inner), deadline) {
        Ok(batcher) => {
          let _ = inner.batcher.set(batcher);
        }
        Err(err) => {
          inner.close();
          return Err(err);
        }
      }
    }

    Ok(Ring { inner })
  }

  /// The ring file descriptor.
  pub fn fd(&self) -> RawFd {
    self.inner.fd.as_raw_fd()
  }

  /// The registered eventfd, when one was configured.
  pub fn event_fd(&self) -> Option<RawFd> {
    self.inner.event_fd.as_ref().map(|fd| fd.as_raw_fd())
  }

  /// Feature bits the kernel reported at setup.
  pub fn features(&self) -> u32 {
    self.inner.params.features
  }

  /// Submission-ring capacity granted by the kernel.
  pub fn capacity(&self) -> u32 {
    self.inner.sq.entries()
  }

  /// Completion-ring capacity granted by the kernel.
  pub fn cq_capacity(&self) -> u32 {
    self.inner.cq.entries()
  }

  /// Submissions dropped by the kernel due to malformed indirection
  /// entries. Nonzero indicates a library bug.
  pub fn dropped(&self) -> u32 {
    self.inner.sq.dropped()
  }

  /// Completions the kernel could not post because the completion ring
  /// was full.
  pub fn overflow(&self) -> u32 {
    self.inner.cq.overflow()
  }

  /// The file registry, when one was configured.
  pub fn file_registry(&self) -> Option<&FileRegistry> {
    self.inner.files.as_ref()
  }

  /// Allocates a tag for an SQE. Monotonic, never zero; unique among
  /// anything in flight.
  pub fn next_tag(&self) -> u64 {
    self.inner.tag.fetch_add(1, Ordering::AcqRel)
  }

  /// Reserves the next submission slot.
  ///
  /// The returned guard dereferences to the reset [`SubmitEntry`]; fill
  /// it (including `user_data`, normally from [`next_tag`]) and call
  /// [`SlotGuard::publish`]. Publishing an entry with a nonzero
  /// `user_data` registers it with the demultiplexer so [`wait`] can
  /// find it; tag zero marks a fire-and-forget entry whose completion is
  /// discarded.
  ///
  /// Blocks (yielding) while the ring is full.
  ///
  /// [`next_tag`]: Self::next_tag
  /// [`wait`]: Self::wait
  pub fn submit_entry(&self) -> Result<SlotGuard<'_>, RingError> {
    if self.inner.shutdown.load(Ordering::Acquire) {
      return Err(RingError::Shutdown);
    }
    let value = self.inner.sq.reserve();
    Ok(SlotGuard { inner: &*self.inner, value, published: false })
  }

  /// Reserves, fills and publishes one SQE, returning the tag to wait
  /// on.
  ///
  /// # Safety
  /// Any address the fill closure stores into the entry must stay valid
  /// and unmoved until the matching completion has been observed via
  /// [`wait`](Self::wait).
  pub unsafe fn submit_with(
    &self,
    fill: impl FnOnce(&mut SubmitEntry),
  ) -> Result<u64, RingError> {
    let tag = self.next_tag();
    let mut slot = self.submit_entry()?;
    fill(&mut slot);
    slot.user_data = tag;
    slot.publish();
    Ok(tag)
  }

  /// Blocks until the operation identified by `tag` completes and
  /// returns its raw CQE payload `(result, flags)`.
  ///
  /// Negative results are returned as-is; use the opcode wrappers for
  /// errno mapping. Each tag delivers exactly once: a second `wait` on
  /// the same tag reports [`RingError::EntryNotFound`].
  pub fn wait(&self, tag: u64) -> Result<(i32, u32), RingError> {
    let record = {
      let map = self.inner.inflight.lock();
      match map.get(&tag) {
        Some(record) => Arc::clone(record),
        None => return Err(RingError::EntryNotFound),
      }
    };
    let outcome = record.wait();
    let removed = self.inner.inflight.lock().remove(&tag);
    if removed.is_some() {
      self.inner.pool.put(record);
    }
    match outcome {
      Outcome::Done { res, flags } => Ok((res, flags)),
      Outcome::Shutdown => Err(RingError::Shutdown),
    }
  }

  /// Tears the ring down: stops the worker (and batcher), fails every
  /// outstanding waiter with [`RingError::Shutdown`], unmaps the shared
  /// regions and closes the descriptor once the last handle drops.
  ///
  /// Idempotent; also invoked automatically when the last clone of this
  /// handle is dropped.
  pub fn close(&self) {
    self.inner.close();
  }
}

impl Clone for Ring {
  fn clone(&self) -> Ring {
    self.inner.handles.fetch_add(1, Ordering::AcqRel);
    Ring { inner: Arc::clone(&self.inner) }
  }
}

impl Drop for Ring {
  fn drop(&mut self) {
    if self.inner.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.inner.close();
    }
  }
}

/// An exclusively reserved submission slot.
///
/// Dropping the guard without publishing publishes a tagless no-op
/// instead: the slot was already promised to the kernel by the
/// reservation, so it cannot be taken back, only neutralized.
pub struct SlotGuard<'ring> {
  inner: &'ring Inner,
  value: u32,
  published: bool,
}

impl SlotGuard<'_> {
  /// Makes the entry visible to the kernel on the next enter and, for a
  /// nonzero `user_data`, registers it with the completion
  /// demultiplexer.
  pub fn publish(mut self) {
    self.publish_inner();
  }

  fn publish_inner(&mut self) {
    if self.published {
      return;
    }
    self.published = true;
    let tag = self.user_data;
    if tag != 0 {
      self.inner.register(tag);
    }
    self.inner.sq.publish(self.value);
    self.inner.kick();
  }
}

impl Deref for SlotGuard<'_> {
  type Target = SubmitEntry;

  fn deref(&self) -> &SubmitEntry {
    // SAFETY: the reservation grants exclusive access to this slot until
    // publication.
    unsafe { &*self.inner.sq.sqe_ptr(self.value) }
  }
}

impl DerefMut for SlotGuard<'_> {
  fn deref_mut(&mut self) -> &mut SubmitEntry {
    // SAFETY: see Deref.
    unsafe { &mut *self.inner.sq.sqe_ptr(self.value) }
  }
}

impl Drop for SlotGuard<'_> {
  fn drop(&mut self) {
    if !self.published {
      self.reset();
      self.publish_inner();
    }
  }
}
