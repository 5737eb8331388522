//! Ring-backed file I/O adapters: positional `Read`/`Write`/`Seek` over
//! one file, and a fan-out writer that lands one buffer in several files
//! with a single ring enter.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;

use crate::error::RingError;
use crate::ring::Ring;

/// `std::io`-flavored file access that routes every read and write
/// through the ring, tracking the file offset internally.
///
/// Created with [`Ring::file`]. When the ring carries a file registry the
/// descriptor is registered on creation and unregistered on drop.
pub struct RingFile {
  ring: Ring,
  file: File,
  offset: u64,
  registered: bool,
}

impl Ring {
  /// Wraps `file` in ring-backed positional I/O.
  pub fn file(&self, file: File) -> Result<RingFile, RingError> {
    let registered = match self.file_registry() {
      Some(registry) => {
        registry.register(file.as_raw_fd())?;
        true
      }
      None => false,
    };
    Ok(RingFile { ring: self.clone(), file, offset: 0, registered })
  }

  /// Builds a fan-out writer over `files`.
  pub fn multi_writer(&self, files: Vec<File>) -> MultiWriter {
    let offsets = vec![0; files.len()];
    MultiWriter { ring: self.clone(), files, offsets }
  }
}

impl RingFile {
  /// Current file offset used by the next read or write.
  pub fn offset(&self) -> u64 {
    self.offset
  }

  pub fn get_ref(&self) -> &File {
    &self.file
  }
}

impl Read for RingFile {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n =
      self.ring.read_at(self.file.as_raw_fd(), buf, self.offset)?;
    self.offset += n as u64;
    Ok(n)
  }
}

impl Write for RingFile {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let n =
      self.ring.write_at(self.file.as_raw_fd(), buf, self.offset)?;
    self.offset += n as u64;
    Ok(n)
  }

  fn flush(&mut self) -> io::Result<()> {
    // Writes are unbuffered; durability is fsync's job.
    Ok(())
  }
}

impl Seek for RingFile {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    let next = match pos {
      SeekFrom::Start(offset) => offset as i64,
      SeekFrom::Current(delta) => self.offset as i64 + delta,
      SeekFrom::End(delta) => self.file.metadata()?.len() as i64 + delta,
    };
    if next < 0 {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "seek before start of file",
      ));
    }
    self.offset = next as u64;
    Ok(self.offset)
  }
}

impl Drop for RingFile {
  fn drop(&mut self) {
    if self.registered {
      if let Some(registry) = self.ring.file_registry() {
        let _ = registry.unregister(self.file.as_raw_fd());
      }
    }
  }
}

/// Writes one buffer to every file in the set. All entries are published
/// before the ring is entered, so the whole batch rides a single
/// syscall.
pub struct MultiWriter {
  ring: Ring,
  files: Vec<File>,
  offsets: Vec<u64>,
}

impl MultiWriter {
  /// Writes `buf` to every file at its tracked offset.
  ///
  /// Returns the summed byte count. If any write fails, the first error
  /// is reported together with the bytes the other writes landed, as
  /// [`RingError::Partial`].
  pub fn write_all_files(
    &mut self,
    buf: &[u8],
  ) -> Result<usize, RingError> {
    let mut tags = Vec::with_capacity(self.files.len());
    for (i, file) in self.files.iter().enumerate() {
      // SAFETY: buf is borrowed for this whole call, past every wait
      // below.
      let tag = unsafe {
        self.ring.prepare_write(file.as_raw_fd(), buf, self.offsets[i])?
      };
      tags.push(tag);
    }

    let mut written = 0usize;
    let mut first_err: Option<io::Error> = None;
    for (i, tag) in tags.into_iter().enumerate() {
      match self.ring.wait(tag) {
        Ok((res, _flags)) if res >= 0 => {
          written += res as usize;
          self.offsets[i] += res as u64;
        }
        Ok((res, _flags)) => {
          if first_err.is_none() {
            first_err = Some(io::Error::from_raw_os_error(-res));
          }
        }
        Err(err) => {
          if first_err.is_none() {
            first_err = Some(err.into());
          }
        }
      }
    }

    match first_err {
      None => Ok(written),
      Some(source) => Err(RingError::Partial { written, source }),
    }
  }
}

impl Write for MultiWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.write_all_files(buf).map_err(io::Error::from)
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
