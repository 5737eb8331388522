//! Per-operation request records and the pool that recycles them.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crossbeam_queue::SegQueue;

/// What a waiter observes for its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
  /// The matching CQE arrived.
  Done { res: i32, flags: u32 },
  /// The ring was torn down before the CQE arrived.
  Shutdown,
}

/// A single-slot result channel shared between one waiter and the
/// completion worker.
///
/// The mutex holds the slot itself so a wakeup can never be lost: the
/// worker stores the outcome and notifies while holding the lock, and the
/// waiter re-checks the slot around every wait.
pub(crate) struct Record {
  slot: Mutex<Option<Outcome>>,
  cond: Condvar,
}

impl Record {
  fn new() -> Record {
    Record { slot: Mutex::new(None), cond: Condvar::new() }
  }

  /// Delivers a completion. A second delivery for the same record is a
  /// drain bug; it is logged and dropped rather than clobbering the
  /// first result.
  pub fn complete(&self, res: i32, flags: u32) {
    let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_some() {
      tracing::warn!(res, flags, "duplicate completion delivery dropped");
      return;
    }
    *slot = Some(Outcome::Done { res, flags });
    self.cond.notify_one();
  }

  /// Fails the waiter with the shutdown outcome unless a real completion
  /// already landed.
  pub fn fail_shutdown(&self) {
    let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
      *slot = Some(Outcome::Shutdown);
    }
    self.cond.notify_all();
  }

  /// Blocks until an outcome is delivered, taking it out of the slot so
  /// the record can go back to the pool empty.
  pub fn wait(&self) -> Outcome {
    let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
    loop {
      if let Some(out) = slot.take() {
        return out;
      }
      slot = self.cond.wait(slot).unwrap_or_else(|e| e.into_inner());
    }
  }

  #[cfg(test)]
  fn is_empty(&self) -> bool {
    self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_none()
  }
}

/// Free list of request records. Records are allocated on demand when the
/// pool runs dry and returned after their waiter has drained the slot.
pub(crate) struct RecordPool {
  free: SegQueue<Arc<Record>>,
}

impl RecordPool {
  pub fn new() -> RecordPool {
    RecordPool { free: SegQueue::new() }
  }

  pub fn get(&self) -> Arc<Record> {
    self.free.pop().unwrap_or_else(|| Arc::new(Record::new()))
  }

  /// Returns a drained record. The waiter's `wait` already emptied the
  /// slot, so no reset is needed here.
  pub fn put(&self, record: Arc<Record>) {
    self.free.push(record);
  }
}

/// A level-triggered wakeup flag for the background worker.
pub(crate) struct Notify {
  flag: Mutex<bool>,
  cond: Condvar,
}

impl Notify {
  pub fn new() -> Notify {
    Notify { flag: Mutex::new(false), cond: Condvar::new() }
  }

  /// Raises the flag. Performed under the lock so a worker between its
  /// flag check and its wait cannot miss the signal.
  pub fn notify(&self) {
    let mut flag = self.flag.lock().unwrap_or_else(|e| e.into_inner());
    *flag = true;
    self.cond.notify_one();
  }

  /// Waits until the flag is raised or the timeout elapses. Returns
  /// whether the flag was observed (and consumed).
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let mut flag = self.flag.lock().unwrap_or_else(|e| e.into_inner());
    if *flag {
      *flag = false;
      return true;
    }
    let (mut flag, _result) = self
      .cond
      .wait_timeout(flag, timeout)
      .unwrap_or_else(|e| e.into_inner());
    let raised = *flag;
    *flag = false;
    raised
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn test_record_delivers_once() {
    let rec = Arc::new(Record::new());
    rec.complete(15, 0);
    assert_eq!(rec.wait(), Outcome::Done { res: 15, flags: 0 });
    assert!(rec.is_empty());
  }

  #[test]
  fn test_duplicate_completion_is_dropped() {
    let rec = Record::new();
    rec.complete(1, 0);
    rec.complete(2, 0);
    assert_eq!(rec.wait(), Outcome::Done { res: 1, flags: 0 });
  }

  #[test]
  fn test_shutdown_does_not_clobber_result() {
    let rec = Record::new();
    rec.complete(8, 0);
    rec.fail_shutdown();
    assert_eq!(rec.wait(), Outcome::Done { res: 8, flags: 0 });
  }

  #[test]
  fn test_wait_blocks_until_completion() {
    let rec = Arc::new(Record::new());
    let rec2 = Arc::clone(&rec);

    let handle = thread::spawn(move || {
      thread::sleep(Duration::from_millis(50));
      rec2.complete(3, 7);
    });

    let start = std::time::Instant::now();
    assert_eq!(rec.wait(), Outcome::Done { res: 3, flags: 7 });
    assert!(start.elapsed() >= Duration::from_millis(50));
    handle.join().unwrap();
  }

  #[test]
  fn test_pool_recycles_drained_records() {
    let pool = RecordPool::new();
    let rec = pool.get();
    rec.complete(0, 0);
    rec.wait();
    let ptr = Arc::as_ptr(&rec);
    pool.put(rec);

    let again = pool.get();
    assert_eq!(Arc::as_ptr(&again), ptr);
    assert!(again.is_empty());
  }

  #[test]
  fn test_notify_wakes_waiter() {
    let notify = Arc::new(Notify::new());
    let notify2 = Arc::clone(&notify);

    let handle = thread::spawn(move || {
      thread::sleep(Duration::from_millis(20));
      notify2.notify();
    });

    assert!(notify.wait_timeout(Duration::from_secs(2)));
    handle.join().unwrap();
  }

  #[test]
  fn test_notify_timeout_expires() {
    let notify = Notify::new();
    assert!(!notify.wait_timeout(Duration::from_millis(10)));
  }
}
