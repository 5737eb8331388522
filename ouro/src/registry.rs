//! Kernel-side registration: pinned file descriptors, pinned I/O buffers
//! and the completion eventfd.
//!
//! Registered descriptors are addressed by index in SQEs carrying the
//! fixed-file flag; registered buffers back the fixed read/write opcodes.

use std::collections::HashMap;
use std::io::{self, IoSlice};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::ptr;

use crate::error::RingError;
use crate::ring::Ring;
use crate::sync::RwLock;
use crate::sys;

struct Registered {
  fds: Vec<RawFd>,
  index: HashMap<RawFd, u32>,
  /// Whether a descriptor table is currently registered with the kernel.
  registered: bool,
}

/// A table of file descriptors registered with the kernel.
///
/// Lookups are read-mostly and take a shared lock; registration and
/// unregistration take the exclusive lock and re-issue the whole list to
/// the kernel.
///
/// An index stays valid until `unregister` returns for that descriptor.
/// Unregistering while SQEs referencing the index are in flight is a
/// caller error.
pub struct FileRegistry {
  ring_fd: RawFd,
  inner: RwLock<Registered>,
}

impl FileRegistry {
  pub(crate) fn new(ring_fd: RawFd) -> FileRegistry {
    FileRegistry {
      ring_fd,
      inner: RwLock::new(Registered {
        fds: Vec::new(),
        index: HashMap::new(),
        registered: false,
      }),
    }
  }

  /// Registers a descriptor, returning its index in the kernel table.
  /// Registering the same descriptor twice returns the existing index.
  pub fn register(&self, fd: RawFd) -> Result<u32, RingError> {
    let mut inner = self.inner.write();
    if let Some(index) = inner.index.get(&fd) {
      return Ok(*index);
    }
    inner.fds.push(fd);
    let index = inner.fds.len() as u32 - 1;
    inner.index.insert(fd, index);
    if let Err(err) = self.reissue(&mut inner) {
      inner.fds.pop();
      inner.index.remove(&fd);
      return Err(err);
    }
    Ok(index)
  }

  /// Removes a descriptor and re-issues the remaining list. Indices of
  /// descriptors registered after `fd` shift down by one.
  pub fn unregister(&self, fd: RawFd) -> Result<(), RingError> {
    let mut inner = self.inner.write();
    let index = match inner.index.remove(&fd) {
      Some(index) => index as usize,
      None => return Err(RingError::NotRegistered(fd)),
    };
    inner.fds.remove(index);
    let tail: Vec<(usize, RawFd)> = inner
      .fds
      .iter()
      .copied()
      .enumerate()
      .skip(index)
      .collect();
    for (i, moved) in tail {
      inner.index.insert(moved, i as u32);
    }
    self.reissue(&mut inner)
  }

  /// Looks up the registered index for a descriptor.
  pub fn index(&self, fd: RawFd) -> Option<u32> {
    self.inner.read().index.get(&fd).copied()
  }

  pub fn len(&self) -> usize {
    self.inner.read().fds.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The kernel keeps one table per ring, so any change means dropping
  /// the old table and registering the current list.
  fn reissue(&self, inner: &mut Registered) -> Result<(), RingError> {
    if inner.registered {
      sys::register(self.ring_fd, sys::UNREGISTER_FILES, ptr::null(), 0)
        .map_err(RingError::Register)?;
      inner.registered = false;
    }
    if !inner.fds.is_empty() {
      sys::register(
        self.ring_fd,
        sys::REGISTER_FILES,
        inner.fds.as_ptr().cast(),
        inner.fds.len() as u32,
      )
      .map_err(RingError::Register)?;
      inner.registered = true;
    }
    Ok(())
  }
}

impl Ring {
  /// Registers the given buffers with the kernel for use by the fixed
  /// read/write opcodes, addressed by their position in `buffers`.
  ///
  /// # Safety
  /// Every buffer must stay valid, unmoved and otherwise untouched until
  /// [`unregister_buffers`](Self::unregister_buffers) returns or the
  /// ring is closed.
  pub unsafe fn register_buffers(
    &self,
    buffers: &[IoSlice<'_>],
  ) -> Result<(), RingError> {
    let iovecs: Vec<libc::iovec> = buffers
      .iter()
      .map(|buf| libc::iovec {
        iov_base: buf.as_ptr() as *mut _,
        iov_len: buf.len(),
      })
      .collect();
    sys::register(
      self.fd(),
      sys::REGISTER_BUFFERS,
      iovecs.as_ptr().cast(),
      iovecs.len() as u32,
    )
    .map_err(RingError::Register)
  }

  /// Drops the registered buffer table.
  pub fn unregister_buffers(&self) -> Result<(), RingError> {
    sys::register(self.fd(), sys::UNREGISTER_BUFFERS, ptr::null(), 0)
      .map_err(RingError::Register)
  }
}

pub(crate) fn new_eventfd(nonblocking: bool) -> Result<OwnedFd, RingError> {
  let mut flags = libc::EFD_CLOEXEC;
  if nonblocking {
    flags |= libc::EFD_NONBLOCK;
  }
  // SAFETY: plain descriptor-creating syscall.
  let fd = unsafe { libc::eventfd(0, flags) };
  if fd < 0 {
    return Err(RingError::Register(io::Error::last_os_error()));
  }
  // SAFETY: the descriptor is fresh and owned from here.
  Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub(crate) fn register_eventfd(
  ring_fd: RawFd,
  event_fd: RawFd,
) -> Result<(), RingError> {
  let arg: i32 = event_fd;
  sys::register(
    ring_fd,
    sys::REGISTER_EVENTFD,
    (&arg as *const i32).cast(),
    1,
  )
  .map_err(RingError::Register)
}
