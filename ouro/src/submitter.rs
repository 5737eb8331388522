//! Opt-in deadline batcher: trades a bounded amount of latency for fewer
//! enter syscalls.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::RingError;
use crate::ring::Inner;
use crate::sync::Mutex;

enum Msg {
  Tick,
  Stop,
}

/// Coalesces submission ticks and enters the ring once per batch, when
/// either the deadline elapses or enough ticks accumulate.
pub(crate) struct Submitter {
  tx: Sender<Msg>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Submitter {
  pub fn spawn(
    inner: Arc<Inner>,
    deadline: Duration,
  ) -> Result<Submitter, RingError> {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
      .name("ouro-submit".into())
      .spawn(move || run(inner, rx, deadline))
      .map_err(RingError::Setup)?;
    Ok(Submitter { tx, handle: Mutex::new(Some(handle)) })
  }

  /// One logical submit. Never blocks.
  pub fn tick(&self) {
    let _ = self.tx.send(Msg::Tick);
  }

  /// Flushes any open batch and joins the thread. Idempotent.
  pub fn stop(&self) {
    let _ = self.tx.send(Msg::Stop);
    if let Some(handle) = self.handle.lock().take() {
      let _ = handle.join();
    }
  }
}

fn run(inner: Arc<Inner>, rx: Receiver<Msg>, deadline: Duration) {
  // Flush early once half the submission ring is queued, whatever the
  // deadline says.
  let threshold = (inner.sq_entries() / 2).max(1);
  let mut batched: u32 = 0;
  let mut armed_at: Option<Instant> = None;

  let flush = |batched: &mut u32, armed_at: &mut Option<Instant>| {
    tracing::trace!(batch = *batched, "flushing batched submissions");
    inner.enter_for_submit();
    inner.wake_worker();
    *batched = 0;
    *armed_at = None;
  };

  loop {
    let msg = match armed_at {
      None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
      Some(start) => {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
          flush(&mut batched, &mut armed_at);
          continue;
        }
        rx.recv_timeout(deadline - elapsed)
      }
    };
    match msg {
      Ok(Msg::Tick) => {
        if armed_at.is_none() {
          armed_at = Some(Instant::now());
        }
        batched += 1;
        if batched >= threshold {
          flush(&mut batched, &mut armed_at);
        }
      }
      Err(RecvTimeoutError::Timeout) => {
        flush(&mut batched, &mut armed_at);
      }
      Ok(Msg::Stop) | Err(RecvTimeoutError::Disconnected) => {
        if batched > 0 {
          flush(&mut batched, &mut armed_at);
        }
        return;
      }
    }
  }
}
