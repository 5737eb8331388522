#![deny(
  clippy::unnecessary_safety_comment,
  clippy::unsafe_removed_from_name,
  clippy::unnecessary_safety_doc,
  clippy::not_unsafe_ptr_arg_deref,
  clippy::undocumented_unsafe_blocks
)]

//! # ouro
//!
//! A safe, concurrent user-space interface to Linux's io_uring: the pair
//! of shared-memory rings through which applications submit asynchronous
//! I/O and the kernel reports completions.
//!
//! The crate owns the hard part — the ring coordinator. Many threads can
//! reserve, fill and publish submission entries at once without a lock on
//! the ring proper; a background worker enters the kernel, drains the
//! completion ring and routes each completion to the waiter whose tag it
//! carries. Buffers referenced by an in-flight entry are either borrowed
//! across the blocking wrappers or, for the `unsafe` prepare calls, the
//! caller's responsibility to keep alive and unmoved.
//!
//! Rings are plain values: nothing here is process-global, handles are
//! cheap to clone, and several rings can coexist (one per CPU, for
//! example).
//!
//! ```no_run
//! use ouro::{Ring, RingOptions};
//!
//! fn main() -> Result<(), ouro::RingError> {
//!   let ring = Ring::new(1024, RingOptions::default())?;
//!
//!   let file = std::fs::OpenOptions::new()
//!     .create(true)
//!     .read(true)
//!     .write(true)
//!     .open("/tmp/ouro-example")
//!     .map_err(ouro::RingError::Op)?;
//!   let fd = std::os::fd::AsRawFd::as_raw_fd(&file);
//!
//!   let wrote = ring.write_at(fd, b"testing...1,2,3", 0)?;
//!   let mut buf = vec![0u8; wrote];
//!   ring.read_at(fd, &mut buf, 0)?;
//!   assert_eq!(&buf, b"testing...1,2,3");
//!
//!   ring.close();
//!   Ok(())
//! }
//! ```

mod cqueue;
mod entry;
mod error;
mod fio;
mod mmap;
mod ops;
mod registry;
mod request;
mod ring;
mod squeue;
mod submitter;
mod sync;
pub mod sys;

pub use entry::{
  CompletionEntry, KernelTimespec, Opcode, SqeFlags, SubmitEntry,
};
pub use error::RingError;
pub use fio::{MultiWriter, RingFile};
pub use registry::FileRegistry;
pub use ring::{EventfdMode, Ring, RingOptions, SlotGuard};
