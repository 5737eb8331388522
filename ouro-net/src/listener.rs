use std::io;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use ouro::{Ring, RingError};
use socket2::{Domain, Protocol, Socket, Type};

use crate::stream::RingStream;

/// Socket options applied before bind.
#[derive(Debug, Clone, Copy)]
pub struct ListenOptions {
  pub reuse_address: bool,
  pub reuse_port: bool,
  pub backlog: i32,
}

impl Default for ListenOptions {
  fn default() -> Self {
    Self { reuse_address: true, reuse_port: false, backlog: 128 }
  }
}

/// A TCP listener whose readiness is driven by ring poll entries.
///
/// A named background thread arms a poll-add against the listening
/// socket, accepts every ready connection when it completes, re-arms the
/// poll, and delivers connections in the order the kernel reported them.
pub struct RingListener {
  local_addr: SocketAddr,
  socket: Arc<Socket>,
  rx: Receiver<RingStream>,
  stop: Arc<AtomicBool>,
  accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl RingListener {
  /// Binds and listens on `addr`, then starts the accept loop on the
  /// given ring.
  pub fn bind(
    ring: &Ring,
    addr: SocketAddr,
    options: ListenOptions,
  ) -> io::Result<RingListener> {
    let socket = Socket::new(
      Domain::for_address(addr),
      Type::STREAM,
      Some(Protocol::TCP),
    )?;
    socket.set_reuse_address(options.reuse_address)?;
    if options.reuse_port {
      socket.set_reuse_port(true)?;
    }
    socket.bind(&addr.into())?;
    socket.listen(options.backlog)?;
    // The accept loop drains until WouldBlock after each poll
    // completion, so the listening socket must never block.
    socket.set_nonblocking(true)?;

    let local_addr =
      socket.local_addr()?.as_socket().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "not an inet address")
      })?;

    let socket = Arc::new(socket);
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let thread_ring = ring.clone();
    let thread_socket = Arc::clone(&socket);
    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
      .name("ouro-accept".into())
      .spawn(move || {
        accept_loop(thread_ring, thread_socket, tx, thread_stop)
      })?;

    tracing::debug!(%local_addr, "listener started");
    Ok(RingListener {
      local_addr,
      socket,
      rx,
      stop,
      accept_thread: Mutex::new(Some(handle)),
    })
  }

  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  /// Blocks until the next connection arrives. Fails once the listener
  /// has been closed and the queue of already-accepted connections is
  /// drained.
  pub fn accept(&self) -> io::Result<RingStream> {
    self.rx.recv().map_err(|_| {
      io::Error::new(io::ErrorKind::BrokenPipe, "listener closed")
    })
  }

  /// An iterator over accepted connections; ends when the listener
  /// closes.
  pub fn incoming(&self) -> Incoming<'_> {
    Incoming { listener: self }
  }

  /// Stops the accept loop and joins its thread. Idempotent; also runs
  /// on drop.
  pub fn close(&self) {
    self.stop.store(true, Ordering::Release);
    // Kicks the armed poll: shutdown posts POLLHUP to the watcher.
    let _ = self.socket.shutdown(std::net::Shutdown::Both);
    if let Some(handle) = self
      .accept_thread
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .take()
    {
      let _ = handle.join();
    }
  }
}

impl Drop for RingListener {
  fn drop(&mut self) {
    self.close();
  }
}

pub struct Incoming<'a> {
  listener: &'a RingListener,
}

impl Iterator for Incoming<'_> {
  type Item = RingStream;

  fn next(&mut self) -> Option<RingStream> {
    self.listener.accept().ok()
  }
}

fn accept_loop(
  ring: Ring,
  socket: Arc<Socket>,
  tx: Sender<RingStream>,
  stop: Arc<AtomicBool>,
) {
  let fd = socket.as_raw_fd();
  loop {
    if stop.load(Ordering::Acquire) {
      return;
    }
    let revents = match ring.poll_add(fd, libc::POLLIN as u32) {
      Ok(revents) => revents,
      Err(RingError::Shutdown) => return,
      Err(err) => {
        tracing::debug!(error = %err, "listener poll failed");
        return;
      }
    };
    if stop.load(Ordering::Acquire) {
      return;
    }
    if revents & (libc::POLLHUP | libc::POLLERR) as u32 != 0 {
      tracing::debug!(revents, "listening socket went away");
      return;
    }

    // Drain the backlog; connections are delivered in kernel order.
    loop {
      match socket.accept() {
        Ok((conn, peer)) => {
          let peer = match peer.as_socket() {
            Some(peer) => peer,
            None => continue,
          };
          // Accepted sockets inherit nonblocking on some kernels; ring
          // operations want plain blocking descriptors.
          let _ = conn.set_nonblocking(false);
          tracing::trace!(%peer, "accepted connection");
          if tx.send(RingStream::new(ring.clone(), conn, peer)).is_err() {
            return;
          }
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) => {
          tracing::debug!(error = %err, "accept failed");
          return;
        }
      }
    }
  }
}
