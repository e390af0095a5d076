//! The explicit runtime context.
//!
//! A [`Runtime`] owns every registry the threading surface needs. Cloning it
//! is cheap and yields another reference to the same registries. Distinct
//! runtimes share nothing; a handle is only meaningful to the runtime that
//! issued it.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::{RuntimeConfig, runtime_config};
use crate::handle::{Arena, ThreadHandle};
use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::pthread::cond::CondCell;
use crate::pthread::mutex::MutexCell;
use crate::pthread::thread::ThreadRecord;
use crate::pthread::tls::KeyEntry;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct RuntimeInner {
    pub(crate) id: u64,
    pub(crate) config: RuntimeConfig,
    pub(crate) threads: Mutex<Arena<Arc<ThreadRecord>>>,
    pub(crate) mutexes: Mutex<Arena<Arc<MutexCell>>>,
    pub(crate) conds: Mutex<Arena<Arc<CondCell>>>,
    pub(crate) keys: RwLock<Arena<KeyEntry>>,
    pub(crate) metrics: RuntimeMetrics,
    /// Spawned threads that have not finished yet.
    pub(crate) live_spawned: AtomicUsize,
}

/// Handle to one independent threading runtime.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Which runtime thread the current OS thread is, per runtime it has touched.
///
/// Dropping the binding of an adopted record finishes that record, so an
/// adopted thread is torn down when its OS thread's TLS is.
struct Binding {
    runtime: Weak<RuntimeInner>,
    handle: ThreadHandle,
    record: Arc<ThreadRecord>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        if !self.record.adopted {
            return;
        }
        let Some(inner) = self.runtime.upgrade() else {
            return;
        };
        let rt = Runtime { inner };
        // BINDINGS is unreachable from here on; destructors that call back
        // into the runtime find the record through TEARDOWN instead.
        let previous = TEARDOWN.replace(Some((rt.addr(), self.handle)));
        rt.finish_adopted(self.handle, &self.record);
        TEARDOWN.set(previous);
    }
}

thread_local! {
    static BINDINGS: RefCell<Vec<Binding>> = const { RefCell::new(Vec::new()) };
    /// Runtime address and handle of the adopted record being finished.
    static TEARDOWN: Cell<Option<(usize, ThreadHandle)>> = const { Cell::new(None) };
}

impl Runtime {
    /// Runtime with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Runtime with limits taken from the `PTHREAD_RS_*` environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_config(runtime_config())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(runtime = id, ?config, "runtime created");
        Self {
            inner: Arc::new(RuntimeInner {
                id,
                config,
                threads: Mutex::new(Arena::new()),
                mutexes: Mutex::new(Arena::new()),
                conds: Mutex::new(Arena::new()),
                keys: RwLock::new(Arena::new()),
                metrics: RuntimeMetrics::new(),
                live_spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-unique identifier of this runtime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Threads currently registered: running, exited but unjoined, or adopted.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.inner.threads.lock().len()
    }

    /// Mutexes initialized and not yet destroyed.
    #[must_use]
    pub fn mutex_count(&self) -> usize {
        self.inner.mutexes.lock().len()
    }

    /// Condition variables initialized and not yet destroyed.
    #[must_use]
    pub fn cond_count(&self) -> usize {
        self.inner.conds.lock().len()
    }

    /// Live thread-local keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.keys.read().len()
    }

    /// The calling thread's handle and record, adopting the OS thread on
    /// first contact if this runtime did not spawn it.
    pub(crate) fn current(&self) -> (ThreadHandle, Arc<ThreadRecord>) {
        let me = Arc::as_ptr(&self.inner);
        let found = BINDINGS
            .try_with(|cell| {
                cell.borrow()
                    .iter()
                    .find(|b| Weak::as_ptr(&b.runtime) == me)
                    .map(|b| (b.handle, Arc::clone(&b.record)))
            })
            .ok()
            .flatten()
            .or_else(|| self.tearing_down());
        match found {
            Some(bound) => bound,
            None => self.adopt_current(),
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn tearing_down(&self) -> Option<(ThreadHandle, Arc<ThreadRecord>)> {
        let (owner, handle) = TEARDOWN.get()?;
        if owner != self.addr() {
            return None;
        }
        let record = self.inner.threads.lock().get(handle.raw()).cloned()?;
        Some((handle, record))
    }

    fn adopt_current(&self) -> (ThreadHandle, Arc<ThreadRecord>) {
        let record = Arc::new(ThreadRecord::new(true));
        let handle =
            ThreadHandle::from_raw_handle(self.inner.threads.lock().insert(Arc::clone(&record)));
        tracing::trace!(runtime = self.inner.id, %handle, "adopted foreign thread");
        self.bind(handle, Arc::clone(&record));
        (handle, record)
    }

    /// Bind the calling OS thread to `handle`. A thread whose TLS is already
    /// torn down stays unbound.
    pub(crate) fn bind(&self, handle: ThreadHandle, record: Arc<ThreadRecord>) {
        let binding = Binding {
            runtime: Arc::downgrade(&self.inner),
            handle,
            record,
        };
        let _ = BINDINGS.try_with(|cell| {
            let mut bindings = cell.borrow_mut();
            bindings.retain(|b| b.runtime.strong_count() > 0);
            bindings.push(binding);
        });
    }

    pub(crate) fn unbind(&self, handle: ThreadHandle) {
        let me = Arc::as_ptr(&self.inner);
        // The slot may already be gone if the OS thread is tearing down.
        let removed = BINDINGS
            .try_with(|cell| {
                let mut bindings = cell.borrow_mut();
                let at = bindings
                    .iter()
                    .position(|b| Weak::as_ptr(&b.runtime) == me && b.handle == handle)?;
                Some(bindings.swap_remove(at))
            })
            .ok()
            .flatten();
        // Dropped outside the borrow; its record is already finished.
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtimes_have_distinct_ids() {
        let a = Runtime::new();
        let b = Runtime::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn current_is_stable_per_runtime() {
        let rt = Runtime::new();
        let (first, _) = rt.current();
        let (second, _) = rt.current();
        assert_eq!(first, second);
        assert_eq!(rt.thread_count(), 1);
    }

    #[test]
    fn adoption_is_per_runtime() {
        let a = Runtime::new();
        let b = Runtime::new();
        let (ha, _) = a.current();
        let (hb, _) = b.current();
        assert_eq!(a.thread_count(), 1);
        assert_eq!(b.thread_count(), 1);
        // Both are the first slot of their own arena.
        assert_eq!(ha.into_raw(), hb.into_raw());
    }

    #[test]
    fn with_config_is_reported() {
        let cfg = RuntimeConfig::default().with_keys_max(7);
        let rt = Runtime::with_config(cfg);
        assert_eq!(rt.config().keys_max, 7);
        assert_eq!(rt.metrics(), MetricsSnapshot::default());
    }
}
