//! Raw kernel interface: the three ring syscalls and the fixed ABI they
//! accept. See `io_uring.h` in the kernel uapi headers.
//!
//! Everything here is a fixed input to the rest of the crate; nothing in
//! this module is designed, only transcribed.

use std::{io, os::fd::RawFd, ptr};

/// Syscall number for `io_uring_setup`.
pub const SETUP_SYSCALL: libc::c_long = 425;
/// Syscall number for `io_uring_enter`.
pub const ENTER_SYSCALL: libc::c_long = 426;
/// Syscall number for `io_uring_register`.
pub const REGISTER_SYSCALL: libc::c_long = 427;

// io_uring_params->features bits.
pub const FEAT_SINGLE_MMAP: u32 = 1 << 0;
pub const FEAT_NODROP: u32 = 1 << 1;
pub const FEAT_SUBMIT_STABLE: u32 = 1 << 2;
pub const FEAT_RW_CUR_POS: u32 = 1 << 3;
pub const FEAT_CUR_PERSONALITY: u32 = 1 << 4;

// io_uring_setup() flags.
pub const SETUP_IOPOLL: u32 = 1 << 0;
pub const SETUP_SQPOLL: u32 = 1 << 1;
pub const SETUP_SQ_AFF: u32 = 1 << 2;
pub const SETUP_CQSIZE: u32 = 1 << 3;
pub const SETUP_CLAMP: u32 = 1 << 4;
pub const SETUP_ATTACH_WQ: u32 = 1 << 5;

// sq_ring->flags bits.
pub const SQ_NEED_WAKEUP: u32 = 1 << 0;

// io_uring_enter() flags.
pub const ENTER_GETEVENTS: u32 = 1 << 0;
pub const ENTER_SQ_WAKEUP: u32 = 1 << 1;

// io_uring_register() opcodes.
pub const REGISTER_BUFFERS: u32 = 0;
pub const UNREGISTER_BUFFERS: u32 = 1;
pub const REGISTER_FILES: u32 = 2;
pub const UNREGISTER_FILES: u32 = 3;
pub const REGISTER_EVENTFD: u32 = 4;
pub const UNREGISTER_EVENTFD: u32 = 5;
pub const REGISTER_FILES_UPDATE: u32 = 6;

// Magic mmap offsets for the three shared regions.
pub const OFF_SQ_RING: i64 = 0;
pub const OFF_CQ_RING: i64 = 0x8000000;
pub const OFF_SQES: i64 = 0x10000000;

// sqe->fsync_flags.
pub const FSYNC_DATASYNC: u32 = 1 << 0;

/// Submit-ring field offsets, filled in by the kernel at setup.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SqOffsets {
  pub head: u32,
  pub tail: u32,
  pub ring_mask: u32,
  pub ring_entries: u32,
  pub flags: u32,
  pub dropped: u32,
  pub array: u32,
  pub resv1: u32,
  pub resv2: u64,
}

/// Completion-ring field offsets, filled in by the kernel at setup.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct CqOffsets {
  pub head: u32,
  pub tail: u32,
  pub ring_mask: u32,
  pub ring_entries: u32,
  pub overflow: u32,
  pub cqes: u32,
  pub resv: [u64; 2],
}

/// The `io_uring_setup` parameter block. The application fills the input
/// half (entries, flags, sq-thread knobs); the kernel fills the features
/// word and the two offset tables.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Params {
  pub sq_entries: u32,
  pub cq_entries: u32,
  pub flags: u32,
  pub sq_thread_cpu: u32,
  pub sq_thread_idle: u32,
  pub features: u32,
  pub wq_fd: u32,
  pub resv: [u32; 3],
  pub sq_off: SqOffsets,
  pub cq_off: CqOffsets,
}

/// Invokes `io_uring_setup(2)`, returning the ring file descriptor.
pub fn setup(entries: u32, params: &mut Params) -> io::Result<RawFd> {
  // SAFETY: params points at a properly laid out Params block that lives
  // for the duration of the call.
  let ret = unsafe {
    libc::syscall(
      SETUP_SYSCALL,
      entries as libc::c_ulong,
      params as *mut Params,
    )
  };
  if ret < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(ret as RawFd)
}

/// Invokes `io_uring_enter(2)`, returning the number of SQEs consumed.
pub fn enter(
  fd: RawFd,
  to_submit: u32,
  min_complete: u32,
  flags: u32,
) -> io::Result<u32> {
  // SAFETY: plain-integer syscall; the null sigset means "do not touch
  // the signal mask".
  let ret = unsafe {
    libc::syscall(
      ENTER_SYSCALL,
      fd as libc::c_ulong,
      to_submit as libc::c_ulong,
      min_complete as libc::c_ulong,
      flags as libc::c_ulong,
      ptr::null::<libc::sigset_t>(),
      0usize,
    )
  };
  if ret < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(ret as u32)
}

/// Invokes `io_uring_register(2)` with an opcode-specific argument array.
pub fn register(
  fd: RawFd,
  opcode: u32,
  arg: *const libc::c_void,
  nr: u32,
) -> io::Result<()> {
  // SAFETY: the caller guarantees `arg` points at `nr` elements of the
  // layout the opcode expects (or is null for the unregister opcodes).
  let ret = unsafe {
    libc::syscall(
      REGISTER_SYSCALL,
      fd as libc::c_ulong,
      opcode as libc::c_ulong,
      arg,
      nr as libc::c_ulong,
    )
  };
  if ret < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::mem;

  #[test]
  fn test_params_layout_matches_abi() {
    assert_eq!(mem::size_of::<SqOffsets>(), 40);
    assert_eq!(mem::size_of::<CqOffsets>(), 40);
    assert_eq!(mem::size_of::<Params>(), 120);
  }

  #[test]
  fn test_setup_rejects_bad_entries() {
    // Zero entries is invalid at the kernel level as well; the syscall
    // itself must report EINVAL rather than crash.
    let mut params = Params::default();
    let err = setup(0, &mut params).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
  }
}
