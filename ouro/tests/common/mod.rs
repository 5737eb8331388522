use std::ffi::CString;

/// Unique scratch path for raw-libc file tests.
pub fn make_temp_path(prefix: &str, seed: u64) -> CString {
  let path = std::env::temp_dir().join(format!(
    "ouro_{prefix}_{seed}_{}",
    std::process::id()
  ));
  CString::new(path.to_str().expect("temp path is utf-8")).unwrap()
}
