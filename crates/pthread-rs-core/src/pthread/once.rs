//! `pthread_once`.

use parking_lot::Once;

use crate::runtime::Runtime;

/// One-time initialization control, the counterpart of `PTHREAD_ONCE_INIT`.
#[derive(Debug)]
pub struct OnceControl(Once);

impl Default for OnceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl OnceControl {
    #[must_use]
    pub const fn new() -> Self {
        Self(Once::new())
    }

    /// True once an init routine has completed through this control.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.0.state().done()
    }
}

impl Runtime {
    /// Run `init` exactly once per `control`. Concurrent callers block
    /// until the winning call has finished.
    pub fn once<F: FnOnce()>(&self, control: &OnceControl, init: F) {
        control.0.call_once(init);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_once_across_threads() {
        let rt = Runtime::new();
        let control = Arc::new(OnceControl::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let (inner, control, calls) = (rt.clone(), Arc::clone(&control), Arc::clone(&calls));
                rt.create(
                    move |_| {
                        inner.once(&control, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                        });
                        usize::from(control.is_done())
                    },
                    0,
                )
                .unwrap()
            })
            .collect();
        let done: usize = threads.into_iter().map(|t| rt.join(t).unwrap()).sum();
        assert_eq!(done, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_control_is_not_done() {
        let control = OnceControl::new();
        assert!(!control.is_done());
        Runtime::new().once(&control, || {});
        assert!(control.is_done());
    }
}
