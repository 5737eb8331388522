use std::os::fd::AsRawFd;

use ouro::{Ring, RingOptions};

// Pipe-to-file splice: the auxiliary input descriptor travels in the
// SQE's opcode-specific tail.
#[test]
fn test_splice_pipe_to_file() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();

  let mut pipe_fds = [0i32; 2];
  // SAFETY: pipe writes two descriptors into the array.
  let ret = unsafe { libc::pipe(pipe_fds.as_mut_ptr()) };
  assert_eq!(ret, 0);
  let [pipe_read, pipe_write] = pipe_fds;

  let payload = b"hello ring";
  // SAFETY: writes the payload bytes into the pipe.
  let wrote = unsafe {
    libc::write(pipe_write, payload.as_ptr().cast(), payload.len())
  };
  assert_eq!(wrote as usize, payload.len());

  let file = tempfile::tempfile().unwrap();
  let moved = ring
    .splice(
      pipe_read,
      None,
      file.as_raw_fd(),
      Some(0),
      payload.len() as u32,
      0,
    )
    .unwrap();
  assert_eq!(moved, payload.len());

  let mut buf = vec![0u8; payload.len()];
  let read = ring.read_at(file.as_raw_fd(), &mut buf, 0).unwrap();
  assert_eq!(read, payload.len());
  assert_eq!(buf, payload);

  // SAFETY: closes the two pipe descriptors opened above.
  unsafe {
    libc::close(pipe_read);
    libc::close(pipe_write);
  }
  ring.close();
}
