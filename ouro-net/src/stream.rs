use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::os::fd::AsRawFd;

use ouro::{Ring, RingError};
use socket2::Socket;

/// A connected socket whose reads and writes go through the ring.
pub struct RingStream {
  ring: Ring,
  socket: Socket,
  peer: SocketAddr,
}

impl RingStream {
  pub(crate) fn new(
    ring: Ring,
    socket: Socket,
    peer: SocketAddr,
  ) -> RingStream {
    RingStream { ring, socket, peer }
  }

  /// Address of the connected peer.
  pub fn peer_addr(&self) -> SocketAddr {
    self.peer
  }

  pub fn local_addr(&self) -> io::Result<SocketAddr> {
    self.socket.local_addr()?.as_socket().ok_or_else(|| {
      io::Error::new(io::ErrorKind::InvalidInput, "not an inet socket")
    })
  }

  /// Sends `buf`, blocking until the kernel reports completion.
  pub fn send(&self, buf: &[u8]) -> Result<usize, RingError> {
    self.ring.send(self.socket.as_raw_fd(), buf, 0)
  }

  /// Receives into `buf`, blocking until data or end of stream.
  pub fn recv(&self, buf: &mut [u8]) -> Result<usize, RingError> {
    self.ring.recv(self.socket.as_raw_fd(), buf, 0)
  }

  /// Shuts down one or both halves of the connection.
  pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
    self.socket.shutdown(how)
  }
}

impl Read for RingStream {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.recv(buf).map_err(io::Error::from)
  }
}

impl Write for RingStream {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.send(buf).map_err(io::Error::from)
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
