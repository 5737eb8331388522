use std::io::IoSlice;
use std::os::fd::AsRawFd;

use ouro::{Ring, RingError, RingOptions};

#[test]
fn test_file_registry_indices() {
  let ring =
    Ring::new(64, RingOptions::default().file_registry()).unwrap();
  let registry = ring.file_registry().unwrap();

  let a = tempfile::tempfile().unwrap();
  let b = tempfile::tempfile().unwrap();
  let c = tempfile::tempfile().unwrap();

  assert_eq!(registry.register(a.as_raw_fd()).unwrap(), 0);
  assert_eq!(registry.register(b.as_raw_fd()).unwrap(), 1);
  assert_eq!(registry.register(c.as_raw_fd()).unwrap(), 2);

  // Re-registering is a lookup, not a new slot.
  assert_eq!(registry.register(b.as_raw_fd()).unwrap(), 1);
  assert_eq!(registry.len(), 3);

  // Removing the middle entry shifts the tail down.
  registry.unregister(b.as_raw_fd()).unwrap();
  assert_eq!(registry.index(a.as_raw_fd()), Some(0));
  assert_eq!(registry.index(b.as_raw_fd()), None);
  assert_eq!(registry.index(c.as_raw_fd()), Some(1));

  assert!(matches!(
    registry.unregister(b.as_raw_fd()),
    Err(RingError::NotRegistered(_))
  ));

  registry.unregister(a.as_raw_fd()).unwrap();
  registry.unregister(c.as_raw_fd()).unwrap();
  assert!(registry.is_empty());

  ring.close();
}

#[test]
fn test_ring_file_uses_registry() {
  let ring =
    Ring::new(64, RingOptions::default().file_registry()).unwrap();
  let file = tempfile::tempfile().unwrap();

  let rf = ring.file(file).unwrap();
  assert_eq!(ring.file_registry().unwrap().len(), 1);

  drop(rf);
  assert!(ring.file_registry().unwrap().is_empty());
  ring.close();
}

#[test]
fn test_fixed_buffers_roundtrip() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  let file = tempfile::tempfile().unwrap();
  let fd = file.as_raw_fd();

  let write_data = vec![0x42u8; 4096];
  let mut read_buf = vec![0u8; 4096];

  // SAFETY: both buffers stay alive and in place until the unregister
  // call below.
  unsafe {
    ring
      .register_buffers(&[
        IoSlice::new(&write_data),
        IoSlice::new(&read_buf),
      ])
      .unwrap();
  }

  // SAFETY: write_data is registered as buffer 0 and outlives the wait.
  let tag =
    unsafe { ring.prepare_write_fixed(fd, &write_data, 0, 0).unwrap() };
  let (res, _flags) = ring.wait(tag).unwrap();
  assert_eq!(res, 4096);

  // SAFETY: read_buf is registered as buffer 1 and outlives the wait.
  let tag = unsafe {
    ring.prepare_read_fixed(fd, &mut read_buf, 0, 1).unwrap()
  };
  let (res, _flags) = ring.wait(tag).unwrap();
  assert_eq!(res, 4096);
  assert_eq!(read_buf, write_data);

  ring.unregister_buffers().unwrap();
  ring.close();
}
