use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;

use ouro::{Ring, RingOptions};
use ouro_net::{ListenOptions, RingListener};

// Three sequential clients: the listener yields them in the order the
// kernel observed the connections, and data flows both ways through the
// ring.
#[test]
fn test_accept_three_connections_in_order() {
  let ring = Ring::new(256, RingOptions::default()).unwrap();
  let listener = RingListener::bind(
    &ring,
    "127.0.0.1:0".parse().unwrap(),
    ListenOptions { reuse_port: true, ..Default::default() },
  )
  .unwrap();
  let addr = listener.local_addr();

  let client = thread::spawn(move || {
    let mut ports = Vec::new();
    for i in 0..3 {
      let mut stream = TcpStream::connect(addr).unwrap();
      ports.push(stream.local_addr().unwrap().port());

      stream
        .write_all(format!("hello {i}").as_bytes())
        .unwrap();
      let mut buf = [0u8; 16];
      let n = stream.read(&mut buf).unwrap();
      assert_eq!(&buf[..n], format!("echo {i}").as_bytes());
    }
    ports
  });

  let mut seen_ports = Vec::new();
  for i in 0..3 {
    let conn = listener.accept().unwrap();
    seen_ports.push(conn.peer_addr().port());

    let mut buf = [0u8; 16];
    let n = conn.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], format!("hello {i}").as_bytes());
    conn.send(format!("echo {i}").as_bytes()).unwrap();
  }

  let connect_ports = client.join().unwrap();
  assert_eq!(seen_ports, connect_ports);

  listener.close();
  ring.close();
}

#[test]
fn test_incoming_iterator() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  let listener = RingListener::bind(
    &ring,
    "127.0.0.1:0".parse().unwrap(),
    ListenOptions::default(),
  )
  .unwrap();
  let addr = listener.local_addr();

  let client = thread::spawn(move || {
    let streams: Vec<TcpStream> =
      (0..2).map(|_| TcpStream::connect(addr).unwrap()).collect();
    thread::sleep(std::time::Duration::from_millis(100));
    drop(streams);
  });

  let accepted: Vec<_> = listener.incoming().take(2).collect();
  assert_eq!(accepted.len(), 2);

  client.join().unwrap();
  listener.close();
  ring.close();
}

#[test]
fn test_close_stops_accepts() {
  let ring = Ring::new(64, RingOptions::default()).unwrap();
  let listener = RingListener::bind(
    &ring,
    "127.0.0.1:0".parse().unwrap(),
    ListenOptions::default(),
  )
  .unwrap();

  listener.close();
  assert!(listener.accept().is_err());
  ring.close();
}
