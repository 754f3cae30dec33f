use parking_lot::RwLock;
use std::sync::Arc;

/// Shared state guarded by a poison-free reader/writer lock.
pub type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

/// Runs a closure against the shared value under the read lock.
pub trait ReadExecutor<T: ?Sized> {
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R;
}

impl<T> ReadExecutor<T> for Atomic<T> {
    #[inline]
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&*guard)
    }
}

/// Runs a closure against the shared value under the write lock.
///
/// The lock is held for the whole closure, which makes one call a single
/// read-modify-write step. The lock is not re-entrant: the closure must not
/// touch the same `Atomic` again.
pub trait WriteExecutor<T: ?Sized> {
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> WriteExecutor<T> for Atomic<T> {
    #[inline]
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut *guard)
    }
}

/// Clones the shared value out so it can be used after the lock is released.
pub trait Snapshot<T: Clone> {
    fn snapshot(&self) -> T;
}

impl<T: Clone> Snapshot<T> for Atomic<T> {
    #[inline]
    fn snapshot(&self) -> T {
        self.read().clone()
    }
}
