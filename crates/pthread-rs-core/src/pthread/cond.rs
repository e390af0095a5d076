//! Condition variables.
//!
//! A waiter takes a ticket under the condvar's state lock, then releases
//! its mutex while still holding that lock. A signaler that acquired the
//! mutex afterwards therefore always sees the ticket, which makes
//! unlock-and-wait atomic with respect to `signal`/`broadcast`. A ticket
//! only returns from the wait once a signal moved it into the woken set;
//! spurious wake-ups of the underlying condvar are absorbed here.
//!
//! Lock order: condvar state, then mutex state. The mutex is reacquired
//! after the condvar state lock is dropped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, ThreadError};
use crate::handle::{CondHandle, MutexHandle};
use crate::metrics::RuntimeMetrics;
use crate::runtime::Runtime;

#[derive(Debug, Default)]
struct CondState {
    next_ticket: u64,
    waiting: VecDeque<u64>,
    woken: HashSet<u64>,
    /// Mutex the current batch of waiters uses.
    bound: Option<MutexHandle>,
}

pub(crate) struct CondCell {
    state: Mutex<CondState>,
    wakeup: Condvar,
}

impl CondCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(CondState::default()),
            wakeup: Condvar::new(),
        }
    }

    fn waiter_count(&self) -> usize {
        self.state.lock().waiting.len()
    }
}

impl Runtime {
    /// `pthread_cond_init`.
    #[must_use]
    pub fn cond_init(&self) -> CondHandle {
        let handle =
            CondHandle::from_raw_handle(self.inner.conds.lock().insert(Arc::new(CondCell::new())));
        tracing::trace!(runtime = self.inner.id, %handle, "cond initialized");
        handle
    }

    /// Atomically release `mutex` and block until signaled, then reacquire
    /// it. EPERM if the caller does not own `mutex`.
    pub fn cond_wait(&self, cond: CondHandle, mutex: MutexHandle) -> Result<()> {
        self.wait_inner(cond, mutex, None)
    }

    /// Like [`Runtime::cond_wait`] but gives up at `deadline` with
    /// [`ThreadError::TimedOut`]. The mutex is held again on every return
    /// except argument errors.
    pub fn cond_timedwait(
        &self,
        cond: CondHandle,
        mutex: MutexHandle,
        deadline: Instant,
    ) -> Result<()> {
        self.wait_inner(cond, mutex, Some(deadline))
    }

    /// Relative-timeout convenience over [`Runtime::cond_timedwait`].
    pub fn cond_wait_timeout(
        &self,
        cond: CondHandle,
        mutex: MutexHandle,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        self.wait_inner(cond, mutex, deadline)
    }

    fn wait_inner(
        &self,
        cond: CondHandle,
        mutex: MutexHandle,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let cell = self.cond_cell(cond)?;
        let lock = self.mutex_cell(mutex)?;
        let (me, _) = self.current();
        let metrics = &self.inner.metrics;

        let mut st = cell.state.lock();
        let holds = lock.release_for_wait(me)?;
        match st.bound {
            Some(bound) if bound != mutex => {
                tracing::warn!(%cond, %mutex, %bound, "condvar waited on with different mutexes");
            }
            Some(_) => {}
            None => st.bound = Some(mutex),
        }
        let ticket = st.next_ticket;
        st.next_ticket += 1;
        st.waiting.push_back(ticket);
        RuntimeMetrics::inc(&metrics.cond_waits);

        let mut outcome = Ok(());
        while !st.woken.remove(&ticket) {
            let Some(deadline) = deadline else {
                cell.wakeup.wait(&mut st);
                continue;
            };
            if cell.wakeup.wait_until(&mut st, deadline).timed_out() {
                if st.woken.remove(&ticket) {
                    break;
                }
                st.waiting.retain(|t| *t != ticket);
                RuntimeMetrics::inc(&metrics.cond_timeouts);
                tracing::trace!(%cond, "cond wait timed out");
                outcome = Err(ThreadError::TimedOut);
                break;
            }
        }
        if st.waiting.is_empty() && st.woken.is_empty() {
            st.bound = None;
        }
        drop(st);

        lock.reacquire(me, holds, metrics);
        outcome
    }

    /// Wake at most one waiter.
    pub fn cond_signal(&self, cond: CondHandle) -> Result<()> {
        let cell = self.cond_cell(cond)?;
        let mut st = cell.state.lock();
        if let Some(ticket) = st.waiting.pop_front() {
            st.woken.insert(ticket);
            cell.wakeup.notify_all();
        }
        Ok(())
    }

    /// Wake every current waiter.
    pub fn cond_broadcast(&self, cond: CondHandle) -> Result<()> {
        let cell = self.cond_cell(cond)?;
        let mut st = cell.state.lock();
        if !st.waiting.is_empty() {
            let tickets: Vec<u64> = st.waiting.drain(..).collect();
            st.woken.extend(tickets);
            cell.wakeup.notify_all();
        }
        Ok(())
    }

    /// EBUSY while any thread is waiting. The handle is stale afterwards.
    pub fn cond_destroy(&self, cond: CondHandle) -> Result<()> {
        let mut arena = self.inner.conds.lock();
        let cell = arena.get(cond.raw()).ok_or(ThreadError::Invalid)?;
        if cell.waiter_count() > 0 {
            return Err(ThreadError::Busy);
        }
        arena.remove(cond.raw());
        Ok(())
    }

    fn cond_cell(&self, cond: CondHandle) -> Result<Arc<CondCell>> {
        self.inner
            .conds
            .lock()
            .get(cond.raw())
            .cloned()
            .ok_or(ThreadError::Invalid)
    }

    #[cfg(test)]
    pub(crate) fn cond_waiters_for_tests(&self, cond: CondHandle) -> usize {
        self.cond_cell(cond).map_or(0, |cell| cell.waiter_count())
    }
}
