//! The two fixed-size records shared with the kernel: submission entries
//! and completion entries.

use std::ops::BitOr;

/// Operation selector for a submission entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
  Nop = 0,
  Readv,
  Writev,
  Fsync,
  ReadFixed,
  WriteFixed,
  PollAdd,
  PollRemove,
  SyncFileRange,
  SendMsg,
  RecvMsg,
  Timeout,
  TimeoutRemove,
  Accept,
  AsyncCancel,
  LinkTimeout,
  Connect,
  Fallocate,
  OpenAt,
  Close,
  FilesUpdate,
  Statx,
  Read,
  Write,
  Fadvise,
  Madvise,
  Send,
  Recv,
  OpenAt2,
  EpollCtl,
  Splice,
  ProvideBuffers,
  RemoveBuffers,
}

/// Per-SQE flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqeFlags(u8);

impl SqeFlags {
  /// No flags set.
  pub const NONE: Self = Self(0);
  /// `fd` is an index into the registered file table.
  pub const FIXED_FILE: Self = Self(1 << 0);
  /// Issue only after all in-flight entries complete.
  pub const IO_DRAIN: Self = Self(1 << 1);
  /// The next entry does not start until this one completes.
  pub const IO_LINK: Self = Self(1 << 2);
  /// Like `IO_LINK`, but a failure also fails the rest of the chain.
  pub const IO_HARDLINK: Self = Self(1 << 3);
  /// Always punt to async context instead of trying inline first.
  pub const ASYNC: Self = Self(1 << 4);
  /// Select a buffer from a registered buffer group.
  pub const BUFFER_SELECT: Self = Self(1 << 5);

  pub const fn or(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }

  pub const fn contains(self, other: Self) -> bool {
    (self.0 & other.0) == other.0
  }

  pub const fn bits(self) -> u8 {
    self.0
  }
}

impl BitOr for SqeFlags {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self::Output {
    self.or(rhs)
  }
}

/// A submission queue entry. 64 bytes, laid out exactly as the kernel
/// reads it from the mapped SQE array.
///
/// The opcode-specific 24-byte tail is split into the fields modern
/// opcodes actually use; `splice` in particular reads its input fd from
/// `splice_fd_in`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubmitEntry {
  pub opcode: u8,
  pub flags: u8,
  pub ioprio: u16,
  pub fd: i32,
  /// Offset into the file, or a second opcode-specific 64-bit value.
  pub off: u64,
  /// Pointer into user memory (buffer, iovec list, path, sockaddr, ...).
  pub addr: u64,
  pub len: u32,
  /// Opcode-specific 32-bit flags (rw_flags, fsync_flags, poll events...).
  pub op_flags: u32,
  /// Opaque value echoed back unchanged in the matching completion.
  pub user_data: u64,
  pub buf_index: u16,
  pub personality: u16,
  pub splice_fd_in: i32,
  pub pad: [u64; 2],
}

impl SubmitEntry {
  /// Clears every field back to a harmless no-op shape.
  pub fn reset(&mut self) {
    *self = SubmitEntry {
      opcode: Opcode::Nop as u8,
      flags: 0,
      ioprio: 0,
      fd: -1,
      off: 0,
      addr: 0,
      len: 0,
      op_flags: 0,
      user_data: 0,
      buf_index: 0,
      personality: 0,
      splice_fd_in: 0,
      pad: [0; 2],
    };
  }

  pub fn set_opcode(&mut self, opcode: Opcode) {
    self.opcode = opcode as u8;
  }

  pub fn set_flags(&mut self, flags: SqeFlags) {
    self.flags = flags.bits();
  }
}

/// A completion queue entry. 16 bytes, written by the kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionEntry {
  /// Echo of the submission's `user_data`.
  pub user_data: u64,
  /// Bytes transferred, or a negated errno.
  pub res: i32,
  pub flags: u32,
}

impl CompletionEntry {
  pub fn is_zero(&self) -> bool {
    self.user_data == 0 && self.res == 0 && self.flags == 0
  }

  pub fn is_ok(&self) -> bool {
    self.res >= 0
  }
}

/// A kernel timespec as the timeout opcode reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelTimespec {
  pub sec: i64,
  pub nsec: i64,
}

impl From<std::time::Duration> for KernelTimespec {
  fn from(d: std::time::Duration) -> Self {
    Self { sec: d.as_secs() as i64, nsec: d.subsec_nanos() as i64 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::mem;

  #[test]
  fn test_record_layouts_match_abi() {
    assert_eq!(mem::size_of::<SubmitEntry>(), 64);
    assert_eq!(mem::size_of::<CompletionEntry>(), 16);
    assert_eq!(mem::size_of::<KernelTimespec>(), 16);
  }

  #[test]
  fn test_reset_yields_nop() {
    let mut e = SubmitEntry {
      opcode: Opcode::Write as u8,
      flags: 0xff,
      ioprio: 7,
      fd: 42,
      off: 1,
      addr: 2,
      len: 3,
      op_flags: 4,
      user_data: 5,
      buf_index: 6,
      personality: 7,
      splice_fd_in: 8,
      pad: [9; 2],
    };
    e.reset();
    assert_eq!(e.opcode, Opcode::Nop as u8);
    assert_eq!(e.fd, -1);
    assert_eq!(e.user_data, 0);
    assert_eq!(e.splice_fd_in, 0);
  }

  #[test]
  fn test_sqe_flag_composition() {
    let flags = SqeFlags::IO_LINK | SqeFlags::ASYNC;
    assert!(flags.contains(SqeFlags::IO_LINK));
    assert!(flags.contains(SqeFlags::ASYNC));
    assert!(!flags.contains(SqeFlags::FIXED_FILE));
    assert_eq!(flags.bits(), (1 << 2) | (1 << 4));
  }

  #[test]
  fn test_opcode_values_match_abi() {
    assert_eq!(Opcode::Nop as u8, 0);
    assert_eq!(Opcode::Fsync as u8, 3);
    assert_eq!(Opcode::PollAdd as u8, 6);
    assert_eq!(Opcode::Timeout as u8, 11);
    assert_eq!(Opcode::Accept as u8, 13);
    assert_eq!(Opcode::Connect as u8, 16);
    assert_eq!(Opcode::Close as u8, 19);
    assert_eq!(Opcode::Statx as u8, 21);
    assert_eq!(Opcode::Read as u8, 22);
    assert_eq!(Opcode::Write as u8, 23);
    assert_eq!(Opcode::Send as u8, 26);
    assert_eq!(Opcode::Recv as u8, 27);
    assert_eq!(Opcode::Splice as u8, 30);
  }
}
