use std::io;

use thiserror::Error;

/// Errors surfaced by ring construction, submission and completion.
#[derive(Error, Debug)]
pub enum RingError {
  /// The requested capacity is not a power of two in `1..=4096`.
  #[error("entries must be a power of two from 1 to 4096, inclusive")]
  InvalidEntries,

  /// The setup syscall was rejected by the kernel.
  #[error("ring setup failed: {0}")]
  Setup(#[source] io::Error),

  /// One of the shared regions could not be mapped.
  #[error("failed to map ring region: {0}")]
  Mmap(#[source] io::Error),

  /// The enter syscall was rejected by the kernel.
  #[error("ring enter failed: {0}")]
  Enter(#[source] io::Error),

  /// A register/unregister syscall was rejected by the kernel.
  #[error("ring register failed: {0}")]
  Register(#[source] io::Error),

  /// The completion carried a negative result for this operation.
  #[error(transparent)]
  Op(io::Error),

  /// The ring was torn down while this operation was in flight.
  #[error("ring is shutting down")]
  Shutdown,

  /// No in-flight record exists for the requested tag. Seeing this for a
  /// tag returned by a prepare call is a bug in the library.
  #[error("completion entry not found")]
  EntryNotFound,

  /// A batched operation stopped early; `written` bytes landed before the
  /// first failure.
  #[error("batched write stopped after {written} bytes: {source}")]
  Partial {
    written: usize,
    #[source]
    source: io::Error,
  },

  /// The descriptor is not present in the file registry.
  #[error("fd {0} is not registered")]
  NotRegistered(i32),
}

impl RingError {
  /// Maps a raw CQE result into the operation's outcome.
  pub(crate) fn check(res: i32) -> Result<i32, RingError> {
    if res < 0 {
      Err(RingError::Op(io::Error::from_raw_os_error(-res)))
    } else {
      Ok(res)
    }
  }
}

impl From<RingError> for io::Error {
  fn from(err: RingError) -> io::Error {
    match err {
      RingError::Setup(e)
      | RingError::Mmap(e)
      | RingError::Enter(e)
      | RingError::Register(e)
      | RingError::Op(e) => e,
      RingError::Partial { source, .. } => source,
      other => io::Error::new(io::ErrorKind::Other, other),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_check_maps_negative_results() {
    assert_eq!(RingError::check(15).unwrap(), 15);
    assert_eq!(RingError::check(0).unwrap(), 0);

    let err = RingError::check(-libc::ENOENT).unwrap_err();
    match err {
      RingError::Op(io) => {
        assert_eq!(io.raw_os_error(), Some(libc::ENOENT));
      }
      other => panic!("expected Op, got {other:?}"),
    }
  }

  #[test]
  fn test_io_error_conversion_keeps_errno() {
    let err =
      RingError::Op(io::Error::from_raw_os_error(libc::ECONNREFUSED));
    let io: io::Error = err.into();
    assert_eq!(io.raw_os_error(), Some(libc::ECONNREFUSED));
  }
}
