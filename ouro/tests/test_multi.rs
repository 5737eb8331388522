use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use ouro::{Ring, RingOptions};

// One logical write fanned out to three files in a single ring enter:
// total bytes is the sum, and every file holds the buffer.
#[test]
fn test_multi_file_write() {
  let ring = Ring::new(2048, RingOptions::default()).unwrap();

  let files: Vec<std::fs::File> =
    (0..3).map(|_| tempfile::tempfile().unwrap()).collect();
  let mut readers: Vec<std::fs::File> =
    files.iter().map(|f| f.try_clone().unwrap()).collect();

  let mut multi = ring.multi_writer(files);
  let total = multi.write_all_files(b"testing...1,2,3").unwrap();
  assert_eq!(total, 45);

  for reader in &mut readers {
    reader.seek(SeekFrom::Start(0)).unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"testing...1,2,3");
  }

  // A second write lands behind the first in every file.
  let total = multi.write_all_files(b"-again").unwrap();
  assert_eq!(total, 18);
  for reader in &mut readers {
    reader.seek(SeekFrom::Start(0)).unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"testing...1,2,3-again");
  }

  ring.close();
}
