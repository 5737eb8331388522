use std::collections::HashSet;
use std::thread;

use ouro::{Opcode, Ring, RingError, RingOptions, SqeFlags};

#[test]
fn test_single_nop() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  ring.nop().unwrap();
  ring.close();
}

#[test]
fn test_nop_idempotence() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  for _ in 0..100 {
    ring.nop().unwrap();
  }
  assert_eq!(ring.dropped(), 0);
  assert_eq!(ring.overflow(), 0);
  ring.close();
}

// 1000 no-ops from 4 concurrent producers: every completion is zero and
// the tags are a permutation of the 1000 assigned.
#[test]
fn test_nop_storm_four_producers() {
  let ring = Ring::new(2048, RingOptions::default()).unwrap();

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let ring = ring.clone();
      thread::spawn(move || {
        let mut tags = Vec::with_capacity(250);
        for i in 0..250 {
          tags.push(ring.prepare_nop().unwrap());
          if i % 16 == 0 && fastrand::bool() {
            thread::yield_now();
          }
        }
        for &tag in &tags {
          let (res, _flags) = ring.wait(tag).unwrap();
          assert_eq!(res, 0);
        }
        tags
      })
    })
    .collect();

  let mut all = HashSet::new();
  for handle in handles {
    for tag in handle.join().unwrap() {
      assert!(all.insert(tag), "duplicate tag {tag}");
    }
  }
  assert_eq!(all.len(), 1000);
  assert_eq!(ring.dropped(), 0);
  ring.close();
}

// The raw primitive underneath the opcode wrappers: reserve a slot,
// fill it by hand, publish, wait on the tag.
#[test]
fn test_raw_submission_primitive() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();

  let tag = ring.next_tag();
  let mut slot = ring.submit_entry().unwrap();
  slot.set_opcode(Opcode::Nop);
  slot.set_flags(SqeFlags::IO_DRAIN);
  slot.fd = -1;
  slot.user_data = tag;
  slot.publish();

  let (res, _flags) = ring.wait(tag).unwrap();
  assert_eq!(res, 0);
  ring.close();
}

#[test]
fn test_abandoned_slot_is_neutralized() {
  let ring = Ring::new(8, RingOptions::default()).unwrap();
  {
    let _slot = ring.submit_entry().unwrap();
    // Dropped without publish: becomes a tagless no-op.
  }
  // The ring keeps working and the slot is reclaimed.
  for _ in 0..16 {
    ring.nop().unwrap();
  }
  ring.close();
}

#[test]
fn test_second_wait_reports_not_found() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  let tag = ring.prepare_nop().unwrap();
  let (res, _flags) = ring.wait(tag).unwrap();
  assert_eq!(res, 0);
  assert!(matches!(ring.wait(tag), Err(RingError::EntryNotFound)));
  ring.close();
}

#[test]
fn test_invalid_capacities_rejected() {
  assert!(matches!(
    Ring::new(0, RingOptions::default()),
    Err(RingError::InvalidEntries)
  ));
  assert!(matches!(
    Ring::new(3, RingOptions::default()),
    Err(RingError::InvalidEntries)
  ));
  assert!(matches!(
    Ring::new(8192, RingOptions::default()),
    Err(RingError::InvalidEntries)
  ));
}
