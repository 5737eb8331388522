use std::mem;
use std::net::SocketAddr;

/// Builds a kernel sockaddr from a std address. The storage travels by
/// value so callers can keep it on their own frame for the lifetime of
/// an in-flight operation.
pub(crate) fn sockaddr_from(
  addr: &SocketAddr,
) -> (libc::sockaddr_storage, libc::socklen_t) {
  // SAFETY: all-zero is a valid representation for sockaddr_storage.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
  match addr {
    SocketAddr::V4(v4) => {
      let sin = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: v4.port().to_be(),
        sin_addr: libc::in_addr {
          // Octets are already network order; reinterpret, do not swap.
          s_addr: u32::from_ne_bytes(v4.ip().octets()),
        },
        sin_zero: [0; 8],
      };
      // SAFETY: sockaddr_storage is larger than sockaddr_in and has no
      // stricter alignment.
      unsafe {
        (&mut storage as *mut libc::sockaddr_storage)
          .cast::<libc::sockaddr_in>()
          .write(sin)
      };
      (storage, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
    }
    SocketAddr::V6(v6) => {
      let sin6 = libc::sockaddr_in6 {
        sin6_family: libc::AF_INET6 as libc::sa_family_t,
        sin6_port: v6.port().to_be(),
        sin6_flowinfo: v6.flowinfo(),
        sin6_addr: libc::in6_addr { s6_addr: v6.ip().octets() },
        sin6_scope_id: v6.scope_id(),
      };
      // SAFETY: as above, for sockaddr_in6.
      unsafe {
        (&mut storage as *mut libc::sockaddr_storage)
          .cast::<libc::sockaddr_in6>()
          .write(sin6)
      };
      (storage, mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_v4_sockaddr_conversion() {
    let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    let (storage, len) = sockaddr_from(&addr);
    assert_eq!(len as usize, mem::size_of::<libc::sockaddr_in>());

    // SAFETY: sockaddr_from wrote a sockaddr_in into the storage.
    let sin = unsafe {
      &*(&storage as *const libc::sockaddr_storage)
        .cast::<libc::sockaddr_in>()
    };
    assert_eq!(sin.sin_family, libc::AF_INET as libc::sa_family_t);
    assert_eq!(u16::from_be(sin.sin_port), 8080);
    assert_eq!(sin.sin_addr.s_addr.to_ne_bytes(), [127, 0, 0, 1]);
  }

  #[test]
  fn test_v6_sockaddr_conversion() {
    let addr: SocketAddr = "[::1]:443".parse().unwrap();
    let (storage, len) = sockaddr_from(&addr);
    assert_eq!(len as usize, mem::size_of::<libc::sockaddr_in6>());

    // SAFETY: sockaddr_from wrote a sockaddr_in6 into the storage.
    let sin6 = unsafe {
      &*(&storage as *const libc::sockaddr_storage)
        .cast::<libc::sockaddr_in6>()
    };
    assert_eq!(sin6.sin6_family, libc::AF_INET6 as libc::sa_family_t);
    assert_eq!(u16::from_be(sin6.sin6_port), 443);
    let mut expected = [0u8; 16];
    expected[15] = 1;
    assert_eq!(sin6.sin6_addr.s6_addr, expected);
  }
}
