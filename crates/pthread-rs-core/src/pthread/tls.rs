//! Thread-local storage keys.
//!
//! Keys live in a runtime-wide registry with an optional destructor. Values
//! live on the thread record, tagged with the key's generation so a value
//! stored under a deleted key never shows through a key that reuses its slot.
//!
//! Values are pointer-sized integers and 0 is the null value: storing 0
//! clears the slot, and no destructor runs for it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ThreadError};
use crate::handle::{KeyHandle, RawHandle};
use crate::metrics::RuntimeMetrics;
use crate::pthread::thread::ThreadRecord;
use crate::runtime::Runtime;

/// Destructor invoked with a thread's last non-null value for a key.
pub type Destructor = Arc<dyn Fn(usize) + Send + Sync + 'static>;

pub(crate) struct KeyEntry {
    destructor: Option<Destructor>,
}

#[derive(Debug, Clone, Copy)]
struct TlsValue {
    generation: u32,
    value: usize,
}

/// Per-thread values keyed by key slot index.
#[derive(Default)]
pub(crate) struct TlsSlots {
    values: Mutex<HashMap<u32, TlsValue>>,
}

impl TlsSlots {
    fn set(&self, key: RawHandle, value: usize) {
        let mut values = self.values.lock();
        if value == 0 {
            values.remove(&key.index());
        } else {
            values.insert(
                key.index(),
                TlsValue {
                    generation: key.generation(),
                    value,
                },
            );
        }
    }

    fn get(&self, key: RawHandle) -> Option<usize> {
        self.values
            .lock()
            .get(&key.index())
            .filter(|v| v.generation == key.generation())
            .map(|v| v.value)
    }

    /// Take every value out, leaving the slots empty.
    fn drain(&self) -> Vec<(RawHandle, usize)> {
        self.values
            .lock()
            .drain()
            .filter_map(|(index, v)| {
                let raw = (u64::from(v.generation) << 32) | u64::from(index);
                RawHandle::from_raw(raw).map(|key| (key, v.value))
            })
            .collect()
    }
}

impl Runtime {
    /// `pthread_key_create`. [`ThreadError::ResourceExhausted`] once
    /// `keys_max` keys are live.
    pub fn key_create(&self, destructor: Option<Destructor>) -> Result<KeyHandle> {
        let mut keys = self.inner.keys.write();
        if keys.len() >= self.inner.config.keys_max {
            return Err(ThreadError::ResourceExhausted);
        }
        let handle = KeyHandle::from_raw_handle(keys.insert(KeyEntry { destructor }));
        tracing::trace!(runtime = self.inner.id, %handle, "key created");
        Ok(handle)
    }

    /// `pthread_key_delete`. Does not run destructors for values still
    /// stored under the key.
    pub fn key_delete(&self, key: KeyHandle) -> Result<()> {
        self.inner
            .keys
            .write()
            .remove(key.raw())
            .map(drop)
            .ok_or(ThreadError::Invalid)
    }

    /// `pthread_setspecific`. Overwrites without running the destructor.
    pub fn set_specific(&self, key: KeyHandle, value: usize) -> Result<()> {
        self.check_key(key)?;
        let (_, record) = self.current();
        record.tls.set(key.raw(), value);
        Ok(())
    }

    /// `pthread_getspecific`. `None` if this thread never stored a value.
    pub fn get_specific(&self, key: KeyHandle) -> Result<Option<usize>> {
        self.check_key(key)?;
        let (_, record) = self.current();
        Ok(record.tls.get(key.raw()))
    }

    fn check_key(&self, key: KeyHandle) -> Result<()> {
        if self.inner.keys.read().contains(key.raw()) {
            Ok(())
        } else {
            Err(ThreadError::Invalid)
        }
    }

    /// Run destructors for the exiting thread. Values are cleared before
    /// their destructor runs; destructors that store new values trigger
    /// another pass, up to `destructor_iterations` passes.
    pub(crate) fn run_tls_destructors(&self, record: &ThreadRecord) {
        for pass in 0..self.inner.config.destructor_iterations {
            let pending = record.tls.drain();
            if pending.is_empty() {
                return;
            }
            let mut ran = false;
            for (key, value) in pending {
                let destructor = self
                    .inner
                    .keys
                    .read()
                    .get(key)
                    .and_then(|entry| entry.destructor.clone());
                let Some(destructor) = destructor else {
                    continue;
                };
                ran = true;
                RuntimeMetrics::inc(&self.inner.metrics.destructors_run);
                if panic::catch_unwind(AssertUnwindSafe(|| destructor(value))).is_err() {
                    tracing::error!(runtime = self.inner.id, pass, "tls destructor panicked");
                }
            }
            if !ran {
                return;
            }
        }
        let leftover = record.tls.drain().len();
        if leftover > 0 {
            tracing::warn!(runtime = self.inner.id, leftover, "tls values left after final destructor pass");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_without_set_is_none() {
        let rt = Runtime::new();
        let k = rt.key_create(None).unwrap();
        assert_eq!(rt.get_specific(k), Ok(None));
        rt.set_specific(k, 5).unwrap();
        assert_eq!(rt.get_specific(k), Ok(Some(5)));
        rt.set_specific(k, 0).unwrap();
        assert_eq!(rt.get_specific(k), Ok(None));
    }

    #[test]
    fn values_are_per_thread() {
        let rt = Runtime::new();
        let k = rt.key_create(None).unwrap();
        rt.set_specific(k, 1).unwrap();
        let inner = rt.clone();
        let t = rt
            .create(
                move |_| {
                    let before = inner.get_specific(k).unwrap().unwrap_or(0);
                    inner.set_specific(k, 2).unwrap();
                    before
                },
                0,
            )
            .unwrap();
        assert_eq!(rt.join(t), Ok(0));
        assert_eq!(rt.get_specific(k), Ok(Some(1)));
    }

    #[test]
    fn deleted_key_is_invalid() {
        let rt = Runtime::new();
        let k = rt.key_create(None).unwrap();
        rt.set_specific(k, 9).unwrap();
        rt.key_delete(k).unwrap();
        assert_eq!(rt.get_specific(k), Err(ThreadError::Invalid));
        assert_eq!(rt.set_specific(k, 1), Err(ThreadError::Invalid));
        assert_eq!(rt.key_delete(k), Err(ThreadError::Invalid));
        // The slot is reused but the old value does not leak through.
        let reused = rt.key_create(None).unwrap();
        assert_eq!(rt.get_specific(reused), Ok(None));
    }

    #[test]
    fn key_limit_is_enforced() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_keys_max(2));
        let a = rt.key_create(None).unwrap();
        let _b = rt.key_create(None).unwrap();
        assert_eq!(rt.key_create(None), Err(ThreadError::ResourceExhausted));
        rt.key_delete(a).unwrap();
        assert!(rt.key_create(None).is_ok());
    }

    #[test]
    fn destructor_runs_once_with_last_value() {
        let rt = Runtime::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (s, c) = (Arc::clone(&seen), Arc::clone(&calls));
        let k = rt
            .key_create(Some(Arc::new(move |v| {
                s.store(v, Ordering::SeqCst);
                c.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();
        let inner = rt.clone();
        let t = rt
            .create(
                move |_| {
                    inner.set_specific(k, 3).unwrap();
                    inner.set_specific(k, 15).unwrap();
                    0
                },
                0,
            )
            .unwrap();
        rt.join(t).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 15);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rt.metrics().destructors_run, 1);
    }

    #[test]
    fn no_destructor_for_null_or_deleted() {
        let rt = Runtime::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let dtor: Destructor = Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let cleared = rt.key_create(Some(Arc::clone(&dtor))).unwrap();
        let deleted = rt.key_create(Some(dtor)).unwrap();
        let inner = rt.clone();
        let t = rt
            .create(
                move |_| {
                    inner.set_specific(cleared, 1).unwrap();
                    inner.set_specific(cleared, 0).unwrap();
                    inner.set_specific(deleted, 2).unwrap();
                    inner.key_delete(deleted).unwrap();
                    0
                },
                0,
            )
            .unwrap();
        rt.join(t).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn destructor_passes_are_bounded() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_destructor_iterations(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let key_slot = Arc::new(Mutex::new(None::<KeyHandle>));
        let (c, slot, inner) = (Arc::clone(&calls), Arc::clone(&key_slot), rt.clone());
        // Re-arms itself every time it runs.
        let k = rt
            .key_create(Some(Arc::new(move |v| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(k) = *slot.lock() {
                    inner.set_specific(k, v + 1).unwrap();
                }
            })))
            .unwrap();
        *key_slot.lock() = Some(k);
        let setter = rt.clone();
        let t = rt
            .create(
                move |_| {
                    setter.set_specific(k, 1).unwrap();
                    0
                },
                0,
            )
            .unwrap();
        rt.join(t).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
