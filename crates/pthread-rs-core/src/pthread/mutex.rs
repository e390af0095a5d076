//! POSIX mutexes: Normal, Recursive and ErrorCheck.
//!
//! Every mutex records its owner regardless of kind. The kind only decides
//! what happens on a self re-lock and on an unlock by a thread that is not
//! the owner:
//!
//! | kind       | re-lock by owner | unlock by non-owner |
//! |------------|------------------|---------------------|
//! | Normal     | blocks           | unlocks, returns 0  |
//! | Recursive  | count += 1       | EPERM               |
//! | ErrorCheck | EDEADLK          | EPERM               |

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, ThreadError};
use crate::handle::{MutexHandle, ThreadHandle};
use crate::metrics::RuntimeMetrics;
use crate::pthread::unsupported::UnsupportedOp;
use crate::runtime::Runtime;

// ---------------------------------------------------------------------------
// Mutex type constants
// ---------------------------------------------------------------------------

/// Normal mutex: no error checking, no recursive locking.
pub const PTHREAD_MUTEX_NORMAL: i32 = 0;
/// Recursive mutex: the owning thread can re-lock without deadlock.
pub const PTHREAD_MUTEX_RECURSIVE: i32 = 1;
/// Error-checking mutex: returns EDEADLK on a self re-lock.
pub const PTHREAD_MUTEX_ERRORCHECK: i32 = 2;
/// Default mutex type (alias for NORMAL).
pub const PTHREAD_MUTEX_DEFAULT: i32 = PTHREAD_MUTEX_NORMAL;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MutexKind {
    #[default]
    Normal,
    Recursive,
    ErrorCheck,
}

impl MutexKind {
    #[must_use]
    pub const fn from_raw(kind: i32) -> Option<Self> {
        match kind {
            PTHREAD_MUTEX_NORMAL => Some(Self::Normal),
            PTHREAD_MUTEX_RECURSIVE => Some(Self::Recursive),
            PTHREAD_MUTEX_ERRORCHECK => Some(Self::ErrorCheck),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Normal => PTHREAD_MUTEX_NORMAL,
            Self::Recursive => PTHREAD_MUTEX_RECURSIVE,
            Self::ErrorCheck => PTHREAD_MUTEX_ERRORCHECK,
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Mutex attribute object. Only the type is configurable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutexAttr {
    kind: MutexKind,
}

impl MutexAttr {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kind: MutexKind::Normal,
        }
    }

    #[must_use]
    pub const fn with_kind(kind: MutexKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub const fn kind(&self) -> MutexKind {
        self.kind
    }

    /// `pthread_mutexattr_settype`. EINVAL for an unrecognized constant.
    pub fn set_type(&mut self, kind: i32) -> Result<()> {
        self.kind = MutexKind::from_raw(kind).ok_or(ThreadError::Invalid)?;
        Ok(())
    }

    /// `pthread_mutexattr_gettype`.
    #[must_use]
    pub const fn get_type(&self) -> i32 {
        self.kind.as_raw()
    }

    pub fn set_pshared(&mut self, _pshared: i32) -> Result<()> {
        UnsupportedOp::MutexattrSetPshared.invoke()
    }

    pub fn get_pshared(&self) -> Result<i32> {
        UnsupportedOp::MutexattrGetPshared.invoke().map(|()| 0)
    }

    pub fn set_protocol(&mut self, _protocol: i32) -> Result<()> {
        UnsupportedOp::MutexattrSetProtocol.invoke()
    }

    pub fn get_protocol(&self) -> Result<i32> {
        UnsupportedOp::MutexattrGetProtocol.invoke().map(|()| 0)
    }

    pub fn set_prioceiling(&mut self, _prioceiling: i32) -> Result<()> {
        UnsupportedOp::MutexattrSetPrioceiling.invoke()
    }

    pub fn get_prioceiling(&self) -> Result<i32> {
        UnsupportedOp::MutexattrGetPrioceiling.invoke().map(|()| 0)
    }
}

// ---------------------------------------------------------------------------
// Lock state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MutexState {
    owner: Option<ThreadHandle>,
    count: u32,
}

pub(crate) struct MutexCell {
    kind: MutexKind,
    state: Mutex<MutexState>,
    available: Condvar,
}

impl MutexCell {
    pub(crate) fn new(kind: MutexKind) -> Self {
        Self {
            kind,
            state: Mutex::new(MutexState::default()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn kind(&self) -> MutexKind {
        self.kind
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    pub(crate) fn lock(&self, me: ThreadHandle, metrics: &RuntimeMetrics) -> Result<()> {
        let mut st = self.state.lock();
        match st.owner {
            None => {
                st.owner = Some(me);
                st.count = 1;
                return Ok(());
            }
            Some(owner) if owner == me => match self.kind {
                MutexKind::Recursive => {
                    st.count = st.count.checked_add(1).ok_or(ThreadError::ResourceExhausted)?;
                    return Ok(());
                }
                MutexKind::ErrorCheck => return Err(ThreadError::Deadlock),
                // A Normal self re-lock waits like any other contender.
                MutexKind::Normal => {}
            },
            Some(_) => {}
        }

        RuntimeMetrics::inc(&metrics.mutex_contended);
        tracing::trace!(kind = ?self.kind, %me, "mutex contended");
        while st.owner.is_some() {
            self.available.wait(&mut st);
        }
        st.owner = Some(me);
        st.count = 1;
        Ok(())
    }

    pub(crate) fn try_lock(&self, me: ThreadHandle) -> Result<()> {
        let mut st = self.state.lock();
        match st.owner {
            None => {
                st.owner = Some(me);
                st.count = 1;
                Ok(())
            }
            Some(owner) if owner == me && self.kind == MutexKind::Recursive => {
                st.count = st.count.checked_add(1).ok_or(ThreadError::ResourceExhausted)?;
                Ok(())
            }
            Some(_) => Err(ThreadError::Busy),
        }
    }

    pub(crate) fn unlock(&self, me: ThreadHandle) -> Result<()> {
        let mut st = self.state.lock();
        if self.kind == MutexKind::Normal {
            if st.owner.take().is_some() {
                st.count = 0;
                self.available.notify_one();
            }
            return Ok(());
        }
        if st.owner != Some(me) {
            return Err(ThreadError::NotPermitted);
        }
        st.count -= 1;
        if st.count == 0 {
            st.owner = None;
            self.available.notify_one();
        }
        Ok(())
    }

    /// Fully release a mutex the caller owns, returning the hold count so a
    /// condition wait can restore it.
    pub(crate) fn release_for_wait(&self, me: ThreadHandle) -> Result<u32> {
        let mut st = self.state.lock();
        if st.owner != Some(me) {
            return Err(ThreadError::NotPermitted);
        }
        let count = st.count;
        st.owner = None;
        st.count = 0;
        self.available.notify_one();
        Ok(count)
    }

    /// Block until the mutex is free, then take it with `count` holds.
    pub(crate) fn reacquire(&self, me: ThreadHandle, count: u32, metrics: &RuntimeMetrics) {
        let mut st = self.state.lock();
        if st.owner.is_some() {
            RuntimeMetrics::inc(&metrics.mutex_contended);
            while st.owner.is_some() {
                self.available.wait(&mut st);
            }
        }
        st.owner = Some(me);
        st.count = count;
    }
}

// ---------------------------------------------------------------------------
// Runtime operations
// ---------------------------------------------------------------------------

impl Runtime {
    /// `pthread_mutex_init` with an explicit kind.
    #[must_use]
    pub fn mutex_init(&self, kind: MutexKind) -> MutexHandle {
        let cell = Arc::new(MutexCell::new(kind));
        let handle = MutexHandle::from_raw_handle(self.inner.mutexes.lock().insert(cell));
        tracing::trace!(runtime = self.inner.id, %handle, ?kind, "mutex initialized");
        handle
    }

    /// `pthread_mutex_init` from an attribute object.
    #[must_use]
    pub fn mutex_init_with(&self, attr: &MutexAttr) -> MutexHandle {
        self.mutex_init(attr.kind())
    }

    pub fn mutex_lock(&self, mutex: MutexHandle) -> Result<()> {
        let cell = self.mutex_cell(mutex)?;
        let (me, _) = self.current();
        cell.lock(me, &self.inner.metrics)
    }

    pub fn mutex_trylock(&self, mutex: MutexHandle) -> Result<()> {
        let cell = self.mutex_cell(mutex)?;
        let (me, _) = self.current();
        cell.try_lock(me)
    }

    pub fn mutex_unlock(&self, mutex: MutexHandle) -> Result<()> {
        let cell = self.mutex_cell(mutex)?;
        let (me, _) = self.current();
        cell.unlock(me)
    }

    /// EBUSY while locked. The handle is stale afterwards.
    pub fn mutex_destroy(&self, mutex: MutexHandle) -> Result<()> {
        let mut arena = self.inner.mutexes.lock();
        let cell = arena.get(mutex.raw()).ok_or(ThreadError::Invalid)?;
        if cell.is_locked() {
            return Err(ThreadError::Busy);
        }
        arena.remove(mutex.raw());
        Ok(())
    }

    pub fn mutex_kind(&self, mutex: MutexHandle) -> Result<MutexKind> {
        Ok(self.mutex_cell(mutex)?.kind())
    }

    pub(crate) fn mutex_cell(&self, mutex: MutexHandle) -> Result<Arc<MutexCell>> {
        self.inner
            .mutexes
            .lock()
            .get(mutex.raw())
            .cloned()
            .ok_or(ThreadError::Invalid)
    }
}
