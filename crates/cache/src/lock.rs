//! Per-handle operation lock

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Lock serializing a handle's storage operations
///
/// Reentrant so that an operation holding the lock can call back into the
/// handle, e.g. a read that removes an expired entry.
#[derive(Debug)]
pub enum OpLock {
    Noop,
    Reentrant(ReentrantMutex<()>),
}

/// Held for the duration of one operation; released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct OpGuard<'a> {
    _guard: Option<ReentrantMutexGuard<'a, ()>>,
}

impl OpLock {
    pub fn new(thread_safe: bool) -> Self {
        if thread_safe {
            Self::Reentrant(ReentrantMutex::new(()))
        } else {
            Self::Noop
        }
    }

    pub fn lock(&self) -> OpGuard<'_> {
        OpGuard {
            _guard: match self {
                Self::Noop => None,
                Self::Reentrant(mutex) => Some(mutex.lock()),
            },
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}
