//! Synchronization primitives that wrap both `parking_lot` and `std::sync`.
//!
//! - Uses `parking_lot` when the `parking_lot` feature is enabled
//! - Falls back to `std::sync` when the feature is disabled
//! - Removes poisoning by unwrapping poisoned locks

#[cfg(feature = "parking_lot")]
pub use parking_lot::{Mutex, MutexGuard, RwLock};

#[cfg(not(feature = "parking_lot"))]
pub use self::std_sync::*;

#[cfg(not(feature = "parking_lot"))]
mod std_sync {
  use std::sync as std_sync;

  /// A mutual exclusion primitive that wraps `std::sync::Mutex`.
  ///
  /// Unlike `std::sync::Mutex`, this does not support poisoning.
  pub struct Mutex<T: ?Sized> {
    inner: std_sync::Mutex<T>,
  }

  impl<T> Mutex<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
      Self { inner: std_sync::Mutex::new(value) }
    }
  }

  impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex, ignoring poisoning.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
      MutexGuard {
        inner: self.inner.lock().unwrap_or_else(|e| e.into_inner()),
      }
    }
  }

  /// An RAII scoped lock of a mutex.
  pub struct MutexGuard<'a, T: ?Sized> {
    inner: std_sync::MutexGuard<'a, T>,
  }

  impl<T: ?Sized> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
      &self.inner
    }
  }

  impl<T: ?Sized> std::ops::DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
      &mut self.inner
    }
  }

  /// A reader/writer lock that wraps `std::sync::RwLock`.
  ///
  /// Unlike `std::sync::RwLock`, this does not support poisoning.
  pub struct RwLock<T: ?Sized> {
    inner: std_sync::RwLock<T>,
  }

  impl<T> RwLock<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
      Self { inner: std_sync::RwLock::new(value) }
    }
  }

  impl<T: ?Sized> RwLock<T> {
    /// Acquires a shared read lock, ignoring poisoning.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
      RwLockReadGuard {
        inner: self.inner.read().unwrap_or_else(|e| e.into_inner()),
      }
    }

    /// Acquires an exclusive write lock, ignoring poisoning.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
      RwLockWriteGuard {
        inner: self.inner.write().unwrap_or_else(|e| e.into_inner()),
      }
    }
  }

  pub struct RwLockReadGuard<'a, T: ?Sized> {
    inner: std_sync::RwLockReadGuard<'a, T>,
  }

  impl<T: ?Sized> std::ops::Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
      &self.inner
    }
  }

  pub struct RwLockWriteGuard<'a, T: ?Sized> {
    inner: std_sync::RwLockWriteGuard<'a, T>,
  }

  impl<T: ?Sized> std::ops::Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
      &self.inner
    }
  }

  impl<T: ?Sized> std::ops::DerefMut for RwLockWriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
      &mut self.inner
    }
  }
}
