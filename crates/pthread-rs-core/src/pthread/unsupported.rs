//! Operations outside the implemented surface.
//!
//! Thread attributes, reader-writer locks, scheduling, process-shared
//! synchronization and cancellation are all reachable but rejected with
//! `ENOTSUP`. Rejection touches no runtime state, so any number of probes
//! leaves every registry and counter exactly as it was.
//!
//! Because no cancellation request can ever be made, the cancellation
//! point [`Runtime::testcancel`] is always a pass-through.

use crate::error::{Result, ThreadError};
use crate::runtime::Runtime;

macro_rules! unsupported_ops {
    ($($variant:ident => $symbol:literal,)+) => {
        /// Every rejected entry point, named after its POSIX symbol.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum UnsupportedOp {
            $($variant,)+
        }

        impl UnsupportedOp {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            #[must_use]
            pub const fn symbol(self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol,)+
                }
            }
        }
    };
}

unsupported_ops! {
    AttrGetDetachState => "pthread_attr_getdetachstate",
    AttrGetGuardSize => "pthread_attr_getguardsize",
    AttrGetInheritSched => "pthread_attr_getinheritsched",
    AttrGetSchedParam => "pthread_attr_getschedparam",
    AttrGetSchedPolicy => "pthread_attr_getschedpolicy",
    AttrGetScope => "pthread_attr_getscope",
    AttrGetStackAddr => "pthread_attr_getstackaddr",
    AttrGetStackSize => "pthread_attr_getstacksize",
    AttrSetDetachState => "pthread_attr_setdetachstate",
    AttrSetGuardSize => "pthread_attr_setguardsize",
    AttrSetInheritSched => "pthread_attr_setinheritsched",
    AttrSetSchedParam => "pthread_attr_setschedparam",
    AttrSetSchedPolicy => "pthread_attr_setschedpolicy",
    AttrSetScope => "pthread_attr_setscope",
    AttrSetStackAddr => "pthread_attr_setstackaddr",
    AttrSetStackSize => "pthread_attr_setstacksize",
    Cancel => "pthread_cancel",
    SetCancelState => "pthread_setcancelstate",
    SetCancelType => "pthread_setcanceltype",
    CondattrInit => "pthread_condattr_init",
    CondattrDestroy => "pthread_condattr_destroy",
    CondattrGetPshared => "pthread_condattr_getpshared",
    CondattrSetPshared => "pthread_condattr_setpshared",
    GetConcurrency => "pthread_getconcurrency",
    SetConcurrency => "pthread_setconcurrency",
    GetSchedParam => "pthread_getschedparam",
    SetSchedParam => "pthread_setschedparam",
    MutexattrGetPshared => "pthread_mutexattr_getpshared",
    MutexattrSetPshared => "pthread_mutexattr_setpshared",
    MutexattrGetProtocol => "pthread_mutexattr_getprotocol",
    MutexattrSetProtocol => "pthread_mutexattr_setprotocol",
    MutexattrGetPrioceiling => "pthread_mutexattr_getprioceiling",
    MutexattrSetPrioceiling => "pthread_mutexattr_setprioceiling",
    RwlockInit => "pthread_rwlock_init",
    RwlockDestroy => "pthread_rwlock_destroy",
    RwlockRdlock => "pthread_rwlock_rdlock",
    RwlockTryRdlock => "pthread_rwlock_tryrdlock",
    RwlockWrlock => "pthread_rwlock_wrlock",
    RwlockTryWrlock => "pthread_rwlock_trywrlock",
    RwlockUnlock => "pthread_rwlock_unlock",
    RwlockattrInit => "pthread_rwlockattr_init",
    RwlockattrDestroy => "pthread_rwlockattr_destroy",
    RwlockattrGetPshared => "pthread_rwlockattr_getpshared",
    RwlockattrSetPshared => "pthread_rwlockattr_setpshared",
}

impl UnsupportedOp {
    /// Reject the operation.
    pub fn invoke(self) -> Result<()> {
        tracing::trace!(symbol = self.symbol(), "unsupported operation");
        Err(ThreadError::Unsupported(self))
    }

    /// Look an operation up by its POSIX symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }
}

impl std::fmt::Display for UnsupportedOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Runtime {
    /// Route an out-of-scope operation through the gate.
    pub fn unsupported(&self, op: UnsupportedOp) -> Result<()> {
        op.invoke()
    }

    /// `pthread_testcancel`: never acts, since cancellation cannot be requested.
    pub fn testcancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errno;
    use std::collections::HashSet;

    #[test]
    fn every_op_is_enotsup() {
        let rt = Runtime::new();
        for &op in UnsupportedOp::ALL {
            let err = rt.unsupported(op).unwrap_err();
            assert_eq!(err, ThreadError::Unsupported(op));
            assert_eq!(err.errno(), errno::ENOTSUP);
        }
    }

    #[test]
    fn symbols_are_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for &op in UnsupportedOp::ALL {
            assert!(seen.insert(op.symbol()), "duplicate {}", op.symbol());
            assert!(op.symbol().starts_with("pthread_"));
            assert_eq!(UnsupportedOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(UnsupportedOp::from_symbol("pthread_create"), None);
    }

    #[test]
    fn probing_leaves_state_untouched() {
        let rt = Runtime::new();
        let before = (rt.metrics(), rt.thread_count(), rt.mutex_count(), rt.key_count());
        for _ in 0..3 {
            for &op in UnsupportedOp::ALL {
                let _ = rt.unsupported(op);
            }
            rt.testcancel();
        }
        let after = (rt.metrics(), rt.thread_count(), rt.mutex_count(), rt.key_count());
        assert_eq!(before, after);
    }
}
