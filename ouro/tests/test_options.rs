use std::os::fd::AsRawFd;
use std::thread;
use std::time::Duration;

use ouro::{EventfdMode, Ring, RingOptions};

#[test]
fn test_starting_tag() {
  let ring =
    Ring::new(64, RingOptions::default().starting_tag(100_000)).unwrap();
  let tag = ring.prepare_nop().unwrap();
  assert_eq!(tag, 100_000);
  let (res, _flags) = ring.wait(tag).unwrap();
  assert_eq!(res, 0);
  ring.close();
}

#[test]
fn test_zero_starting_tag_is_clamped() {
  // Tag zero is reserved for untracked entries.
  let ring =
    Ring::new(64, RingOptions::default().starting_tag(0)).unwrap();
  let tag = ring.prepare_nop().unwrap();
  assert_eq!(tag, 1);
  ring.wait(tag).unwrap();
  ring.close();
}

#[test]
fn test_batched_submitter_completes_everything() {
  let options = RingOptions::default()
    .submit_deadline(Duration::from_micros(100));
  let ring = Ring::new(256, options).unwrap();

  let handles: Vec<_> = (0..2)
    .map(|_| {
      let ring = ring.clone();
      thread::spawn(move || {
        for _ in 0..50 {
          ring.nop().unwrap();
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }
  ring.close();
}

#[test]
fn test_eventfd_blocking_mode() {
  let options =
    RingOptions::default().eventfd(EventfdMode::Blocking);
  let ring = Ring::new(64, options).unwrap();
  assert!(ring.event_fd().is_some());

  let file = tempfile::tempfile().unwrap();
  let fd = file.as_raw_fd();
  for i in 0..10u8 {
    let data = [i; 32];
    assert_eq!(ring.write_at(fd, &data, 0).unwrap(), 32);
    let mut buf = [0u8; 32];
    assert_eq!(ring.read_at(fd, &mut buf, 0).unwrap(), 32);
    assert_eq!(buf, data);
  }
  ring.close();
}

#[test]
fn test_eventfd_nonblocking_mode_is_exposed() {
  let options =
    RingOptions::default().eventfd(EventfdMode::NonBlocking);
  let ring = Ring::new(64, options).unwrap();
  let efd = ring.event_fd().unwrap();
  assert!(efd >= 0);
  ring.nop().unwrap();
  ring.close();
}

#[test]
fn test_cq_entries_option() {
  let ring =
    Ring::new(8, RingOptions::default().cq_entries(64)).unwrap();
  assert!(ring.cq_capacity() >= 64);
  ring.nop().unwrap();
  ring.close();
}
