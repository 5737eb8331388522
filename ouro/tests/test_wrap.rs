use std::ffi::CString;
use std::thread;

use ouro::{Ring, RingOptions};

// A capacity-8 ring wrapped a hundred times over: 800 sequential reads
// from /dev/zero, each of 8 bytes.
#[test]
fn test_submit_ring_wrap() {
  let ring = Ring::new(8, RingOptions::default()).unwrap();
  let path = CString::new("/dev/zero").unwrap();
  let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
  assert!(fd >= 0);

  for _ in 0..100 {
    for _ in 0..8 {
      let mut buf = [0xffu8; 8];
      let n = ring.read_at(fd, &mut buf, 0).unwrap();
      assert_eq!(n, 8);
      assert_eq!(buf, [0u8; 8]);
    }
  }
  assert_eq!(ring.dropped(), 0);

  unsafe {
    libc::close(fd);
  }
  ring.close();
}

// Four producers hammering a capacity-8 ring: 40 one-byte reads, no tag
// duplication, no deadlock under back-pressure.
#[test]
fn test_concurrent_zero_readers() {
  let ring = Ring::new(8, RingOptions::default()).unwrap();
  let path = CString::new("/dev/zero").unwrap();
  let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
  assert!(fd >= 0);

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let ring = ring.clone();
      thread::spawn(move || {
        for _ in 0..10 {
          let mut buf = [0xffu8; 1];
          let n = ring.read_at(fd, &mut buf, 0).unwrap();
          assert_eq!(n, 1);
          assert_eq!(buf[0], 0);
          if fastrand::bool() {
            thread::yield_now();
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }
  assert_eq!(ring.dropped(), 0);

  unsafe {
    libc::close(fd);
  }
  ring.close();
}

// Allocation churn on other threads while reads are in flight; buffers
// referenced by SQEs stay pinned because they are owned stack/heap
// allocations that never move.
#[test]
fn test_reads_survive_allocation_pressure() {
  let ring = Ring::new(8, RingOptions::default()).unwrap();
  let path = CString::new("/dev/zero").unwrap();
  let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
  assert!(fd >= 0);

  let churn = thread::spawn(|| {
    let mut junk = Vec::new();
    for i in 0..2000 {
      junk.push(vec![i as u8; 1024]);
      if junk.len() > 64 {
        junk.drain(..32);
      }
    }
    junk.len()
  });

  for _ in 0..200 {
    let mut buf = vec![0xffu8; 64];
    let n = ring.read_at(fd, &mut buf, 0).unwrap();
    assert_eq!(n, 64);
    assert!(buf.iter().all(|&b| b == 0));
  }

  assert!(churn.join().unwrap() > 0);
  unsafe {
    libc::close(fd);
  }
  ring.close();
}
