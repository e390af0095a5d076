//! Thread lifecycle: create, join, detach, exit, self, equal.
//!
//! ## Architecture
//!
//! Every thread the runtime knows about has a [`ThreadRecord`] in the
//! thread arena. Spawned threads run on `std::thread` behind a trampoline
//! that binds the OS thread to its record, runs the entry, and finishes the
//! record with the entry's return value (or the value passed to
//! [`Runtime::exit`]).
//!
//! Phase transitions, all under the record's state lock:
//!
//! ```text
//! Running --finish--> Exited --join--> Joined (record freed)
//! Running --detach--> Detached --finish--> (record freed)
//! Exited  --detach--> (record freed)
//! ```
//!
//! A record only leaves the arena once, either in `join` or on the
//! detached path, so a handle goes stale exactly when its thread's
//! resources are reclaimed.
//!
//! Adopted threads are finished when their OS thread ends without calling
//! [`Runtime::exit`]: destructors run, a blocked joiner is woken with exit
//! value 0, and the record is freed whatever its phase.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, ThreadError};
use crate::handle::ThreadHandle;
use crate::metrics::RuntimeMetrics;
use crate::pthread::tls::TlsSlots;
use crate::runtime::Runtime;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    Exited,
    Joined,
    Detached,
}

pub(crate) struct ThreadState {
    pub(crate) phase: Phase,
    pub(crate) exit_value: Option<usize>,
    /// Thread currently blocked in `join` on this record.
    pub(crate) joiner: Option<ThreadHandle>,
    /// Panic payload from the entry, handed to the joiner.
    panic: Option<Box<dyn Any + Send + 'static>>,
    /// Destructors have run and the exit value is published.
    finished: bool,
}

pub(crate) struct ThreadRecord {
    pub(crate) state: Mutex<ThreadState>,
    exited: Condvar,
    pub(crate) tls: TlsSlots,
    os: Mutex<Option<std::thread::JoinHandle<()>>>,
    /// The OS thread was not spawned by this runtime.
    pub(crate) adopted: bool,
}

impl ThreadRecord {
    pub(crate) fn new(adopted: bool) -> Self {
        Self {
            state: Mutex::new(ThreadState {
                phase: Phase::Running,
                exit_value: None,
                joiner: None,
                panic: None,
                finished: false,
            }),
            exited: Condvar::new(),
            tls: TlsSlots::default(),
            os: Mutex::new(None),
            adopted,
        }
    }
}

/// Unwind payload carrying the value passed to [`Runtime::exit`].
pub(crate) struct ThreadExit(pub(crate) usize);

// ---------------------------------------------------------------------------
// Runtime operations
// ---------------------------------------------------------------------------

impl Runtime {
    /// Start a new thread running `entry(arg)`.
    ///
    /// The entry's return value becomes the thread's exit value. Fails with
    /// [`ThreadError::ResourceExhausted`] when `max_threads` spawned threads
    /// are live or the OS refuses a new thread.
    pub fn create<F>(&self, entry: F, arg: usize) -> Result<ThreadHandle>
    where
        F: FnOnce(usize) -> usize + Send + 'static,
    {
        let inner = &self.inner;
        let live = inner.live_spawned.fetch_add(1, Ordering::AcqRel);
        if live >= inner.config.max_threads {
            inner.live_spawned.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(runtime = inner.id, live, "thread limit reached");
            return Err(ThreadError::ResourceExhausted);
        }

        let record = Arc::new(ThreadRecord::new(false));
        let handle = ThreadHandle::from_raw_handle(inner.threads.lock().insert(Arc::clone(&record)));

        let mut builder = std::thread::Builder::new().name(format!("pthread-rs-{}", handle.into_raw()));
        if let Some(stack_size) = inner.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let runtime = self.clone();
        let child_record = Arc::clone(&record);
        match builder.spawn(move || runtime.run_spawned(handle, child_record, entry, arg)) {
            Ok(os) => {
                *record.os.lock() = Some(os);
                RuntimeMetrics::inc(&inner.metrics.threads_created);
                tracing::debug!(runtime = inner.id, %handle, "thread created");
                Ok(handle)
            }
            Err(err) => {
                inner.threads.lock().remove(handle.raw());
                inner.live_spawned.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(runtime = inner.id, error = %err, "thread spawn failed");
                Err(ThreadError::ResourceExhausted)
            }
        }
    }

    fn run_spawned<F>(&self, handle: ThreadHandle, record: Arc<ThreadRecord>, entry: F, arg: usize)
    where
        F: FnOnce(usize) -> usize,
    {
        self.bind(handle, Arc::clone(&record));
        let (value, panic) = match panic::catch_unwind(AssertUnwindSafe(|| entry(arg))) {
            Ok(value) => (value, None),
            Err(payload) => match payload.downcast::<ThreadExit>() {
                Ok(exit) => (exit.0, None),
                Err(payload) => {
                    tracing::error!(runtime = self.inner.id, %handle, "thread entry panicked");
                    (0, Some(payload))
                }
            },
        };
        // Released before the record can leave the arena, so a detached
        // thread's slot is free for `create` as soon as its handle is stale.
        self.inner.live_spawned.fetch_sub(1, Ordering::AcqRel);
        self.finish_thread(handle, &record, value, panic, false);
    }

    /// Finish an adopted record whose OS thread is ending.
    pub(crate) fn finish_adopted(&self, handle: ThreadHandle, record: &Arc<ThreadRecord>) {
        if record.state.lock().finished {
            return;
        }
        self.finish_thread(handle, record, 0, None, true);
    }

    /// Run TLS destructors, publish the exit value and wake the joiner.
    ///
    /// With `release` the record leaves the arena even if it is not detached.
    fn finish_thread(
        &self,
        handle: ThreadHandle,
        record: &Arc<ThreadRecord>,
        value: usize,
        panic: Option<Box<dyn Any + Send + 'static>>,
        release: bool,
    ) {
        self.run_tls_destructors(record);
        RuntimeMetrics::inc(&self.inner.metrics.threads_exited);

        let reclaim = {
            let mut st = record.state.lock();
            st.exit_value = Some(value);
            st.finished = true;
            if st.phase == Phase::Detached {
                if panic.is_some() {
                    tracing::error!(runtime = self.inner.id, %handle, "detached thread panicked");
                }
                true
            } else {
                st.phase = Phase::Exited;
                st.panic = panic;
                release
            }
        };
        record.exited.notify_all();

        if reclaim {
            self.inner.threads.lock().remove(handle.raw());
        }
        self.unbind(handle);
        tracing::debug!(runtime = self.inner.id, %handle, value, reclaim, "thread exited");
    }

    /// Terminate the calling thread with `value` as its exit value.
    ///
    /// Unwinds the caller's stack, so destructors of live Rust values run.
    /// On a thread this runtime did not spawn, the record is finished here
    /// and the unwind continues into whatever frame catches it.
    pub fn exit(&self, value: usize) -> ! {
        let (handle, record) = self.current();
        if record.adopted {
            self.finish_thread(handle, &record, value, None, false);
        }
        panic::resume_unwind(Box::new(ThreadExit(value)))
    }

    /// Wait for `thread` to exit and consume its exit value.
    ///
    /// - [`ThreadError::Deadlock`] if `thread` is the caller.
    /// - [`ThreadError::Invalid`] if the handle is stale, or the thread is
    ///   detached, already joined, or already being joined.
    ///
    /// If the thread's entry panicked, the panic resumes in the caller.
    pub fn join(&self, thread: ThreadHandle) -> Result<usize> {
        match self.try_join(thread)? {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// [`Runtime::join`] that hands back the entry's panic payload instead
    /// of resuming it. The thread is reclaimed either way.
    pub fn try_join(&self, thread: ThreadHandle) -> Result<std::thread::Result<usize>> {
        let (me, _) = self.current();
        if me == thread {
            return Err(ThreadError::Deadlock);
        }
        let record = self.thread_record(thread)?;

        let (value, panic) = {
            let mut st = record.state.lock();
            match st.phase {
                Phase::Joined | Phase::Detached => return Err(ThreadError::Invalid),
                _ if st.joiner.is_some() => return Err(ThreadError::Invalid),
                _ => {}
            }
            st.joiner = Some(me);
            while st.phase == Phase::Running {
                record.exited.wait(&mut st);
            }
            st.phase = Phase::Joined;
            st.joiner = None;
            (st.exit_value.take().unwrap_or(0), st.panic.take())
        };

        self.inner.threads.lock().remove(thread.raw());
        if let Some(os) = record.os.lock().take() {
            // The trampoline has already published its result.
            let _ = os.join();
        }
        RuntimeMetrics::inc(&self.inner.metrics.threads_joined);
        tracing::debug!(runtime = self.inner.id, %thread, value, "thread joined");

        Ok(panic.map_or(Ok(value), Err))
    }

    /// Mark `thread` as detached; its resources are reclaimed when it exits,
    /// or immediately if it already has.
    ///
    /// [`ThreadError::Invalid`] if the handle is stale, the thread is already
    /// detached or joined, or another thread is blocked joining it.
    pub fn detach(&self, thread: ThreadHandle) -> Result<()> {
        let record = self.thread_record(thread)?;
        let reclaim = {
            let mut st = record.state.lock();
            match st.phase {
                Phase::Joined | Phase::Detached => return Err(ThreadError::Invalid),
                _ if st.joiner.is_some() => return Err(ThreadError::Invalid),
                Phase::Running => {
                    st.phase = Phase::Detached;
                    false
                }
                Phase::Exited => {
                    st.phase = Phase::Detached;
                    st.panic = None;
                    true
                }
            }
        };
        if reclaim {
            self.inner.threads.lock().remove(thread.raw());
            record.os.lock().take();
        }
        RuntimeMetrics::inc(&self.inner.metrics.threads_detached);
        tracing::debug!(runtime = self.inner.id, %thread, reclaim, "thread detached");
        Ok(())
    }

    /// Handle of the calling thread. Never fails.
    #[must_use]
    pub fn self_handle(&self) -> ThreadHandle {
        self.current().0
    }

    #[must_use]
    pub fn equal(&self, a: ThreadHandle, b: ThreadHandle) -> bool {
        a == b
    }

    fn thread_record(&self, thread: ThreadHandle) -> Result<Arc<ThreadRecord>> {
        self.inner
            .threads
            .lock()
            .get(thread.raw())
            .cloned()
            .ok_or(ThreadError::Invalid)
    }

    #[cfg(test)]
    pub(crate) fn thread_state_for_tests(&self, thread: ThreadHandle) -> Option<Phase> {
        let record = self.thread_record(thread).ok()?;
        let phase = record.state.lock().phase;
        Some(phase)
    }
}
