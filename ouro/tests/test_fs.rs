use std::ffi::CString;
use std::mem;

use ouro::{Ring, RingOptions};

#[test]
fn test_openat_statx_fallocate() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();

  let dir = tempfile::tempdir().unwrap();
  let path = CString::new(
    dir.path().join("scratch.txt").to_str().unwrap(),
  )
  .unwrap();

  let fd = ring
    .openat(
      libc::AT_FDCWD,
      &path,
      libc::O_CREAT | libc::O_RDWR,
      0o644,
    )
    .unwrap();

  let wrote = ring.write_at(fd, b"0123456789", 0).unwrap();
  assert_eq!(wrote, 10);
  ring.fsync(fd).unwrap();

  // SAFETY: all-zero is a valid statx result buffer.
  let mut stx: libc::statx = unsafe { mem::zeroed() };
  ring
    .statx(libc::AT_FDCWD, &path, 0, libc::STATX_SIZE, &mut stx)
    .unwrap();
  assert_eq!(stx.stx_size, 10);

  ring.fallocate(fd, 0, 0, 4096).unwrap();
  // SAFETY: as above.
  let mut stx: libc::statx = unsafe { mem::zeroed() };
  ring
    .statx(libc::AT_FDCWD, &path, 0, libc::STATX_SIZE, &mut stx)
    .unwrap();
  assert_eq!(stx.stx_size, 4096);

  ring
    .fadvise(fd, 0, 4096, libc::POSIX_FADV_SEQUENTIAL)
    .unwrap();
  ring.fdatasync(fd).unwrap();
  ring.close_fd(fd).unwrap();
  ring.close();
}
