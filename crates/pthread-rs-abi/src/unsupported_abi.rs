//! Exports for operations outside the implemented surface.
//!
//! Each returns `ENOTSUP` and touches nothing. `prs_pthread_attr_init` and
//! `prs_pthread_attr_destroy` succeed so that callers can still build the
//! (ignored) attribute object they pass to `prs_pthread_create`.

use std::ffi::{c_int, c_void};

use pthread_rs_core::UnsupportedOp;
use pthread_rs_core::errno::EINVAL;

use crate::runtime_state::{global_runtime, rc};

macro_rules! unsupported_abi {
    ($($name:ident($($arg:ident: $ty:ty),*) => $op:ident;)+) => {
        $(
            #[doc = concat!("Always `ENOTSUP` (`", stringify!($op), "`).")]
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name($($arg: $ty),*) -> c_int {
                $(let _ = $arg;)*
                rc(global_runtime().unsupported(UnsupportedOp::$op))
            }
        )+

        /// Export name and gate operation for every stub above.
        pub const UNSUPPORTED_EXPORTS: &[(&str, UnsupportedOp)] = &[
            $((stringify!($name), UnsupportedOp::$op),)+
        ];
    };
}

unsupported_abi! {
    prs_pthread_attr_getdetachstate(attr: *const c_void, state: *mut c_int) => AttrGetDetachState;
    prs_pthread_attr_getguardsize(attr: *const c_void, size: *mut usize) => AttrGetGuardSize;
    prs_pthread_attr_getinheritsched(attr: *const c_void, sched: *mut c_int) => AttrGetInheritSched;
    prs_pthread_attr_getschedparam(attr: *const c_void, param: *mut c_void) => AttrGetSchedParam;
    prs_pthread_attr_getschedpolicy(attr: *const c_void, policy: *mut c_int) => AttrGetSchedPolicy;
    prs_pthread_attr_getscope(attr: *const c_void, scope: *mut c_int) => AttrGetScope;
    prs_pthread_attr_getstackaddr(attr: *const c_void, addr: *mut *mut c_void) => AttrGetStackAddr;
    prs_pthread_attr_getstacksize(attr: *const c_void, size: *mut usize) => AttrGetStackSize;
    prs_pthread_attr_setdetachstate(attr: *mut c_void, state: c_int) => AttrSetDetachState;
    prs_pthread_attr_setguardsize(attr: *mut c_void, size: usize) => AttrSetGuardSize;
    prs_pthread_attr_setinheritsched(attr: *mut c_void, sched: c_int) => AttrSetInheritSched;
    prs_pthread_attr_setschedparam(attr: *mut c_void, param: *const c_void) => AttrSetSchedParam;
    prs_pthread_attr_setschedpolicy(attr: *mut c_void, policy: c_int) => AttrSetSchedPolicy;
    prs_pthread_attr_setscope(attr: *mut c_void, scope: c_int) => AttrSetScope;
    prs_pthread_attr_setstackaddr(attr: *mut c_void, addr: *mut c_void) => AttrSetStackAddr;
    prs_pthread_attr_setstacksize(attr: *mut c_void, size: usize) => AttrSetStackSize;
    prs_pthread_cancel(thread: u64) => Cancel;
    prs_pthread_setcancelstate(state: c_int, old: *mut c_int) => SetCancelState;
    prs_pthread_setcanceltype(kind: c_int, old: *mut c_int) => SetCancelType;
    prs_pthread_condattr_init(attr: *mut c_void) => CondattrInit;
    prs_pthread_condattr_destroy(attr: *mut c_void) => CondattrDestroy;
    prs_pthread_condattr_getpshared(attr: *const c_void, pshared: *mut c_int) => CondattrGetPshared;
    prs_pthread_condattr_setpshared(attr: *mut c_void, pshared: c_int) => CondattrSetPshared;
    prs_pthread_getconcurrency() => GetConcurrency;
    prs_pthread_setconcurrency(level: c_int) => SetConcurrency;
    prs_pthread_getschedparam(thread: u64, policy: *mut c_int, param: *mut c_void) => GetSchedParam;
    prs_pthread_setschedparam(thread: u64, policy: c_int, param: *const c_void) => SetSchedParam;
    prs_pthread_mutexattr_getpshared(attr: *const c_void, pshared: *mut c_int) => MutexattrGetPshared;
    prs_pthread_mutexattr_getprotocol(attr: *const c_void, protocol: *mut c_int) => MutexattrGetProtocol;
    prs_pthread_mutexattr_setprotocol(attr: *mut c_void, protocol: c_int) => MutexattrSetProtocol;
    prs_pthread_mutexattr_getprioceiling(attr: *const c_void, ceiling: *mut c_int) => MutexattrGetPrioceiling;
    prs_pthread_mutexattr_setprioceiling(attr: *mut c_void, ceiling: c_int) => MutexattrSetPrioceiling;
    prs_pthread_rwlock_init(rwlock: *mut c_void, attr: *const c_void) => RwlockInit;
    prs_pthread_rwlock_destroy(rwlock: *mut c_void) => RwlockDestroy;
    prs_pthread_rwlock_rdlock(rwlock: *mut c_void) => RwlockRdlock;
    prs_pthread_rwlock_tryrdlock(rwlock: *mut c_void) => RwlockTryRdlock;
    prs_pthread_rwlock_wrlock(rwlock: *mut c_void) => RwlockWrlock;
    prs_pthread_rwlock_trywrlock(rwlock: *mut c_void) => RwlockTryWrlock;
    prs_pthread_rwlock_unlock(rwlock: *mut c_void) => RwlockUnlock;
    prs_pthread_rwlockattr_init(attr: *mut c_void) => RwlockattrInit;
    prs_pthread_rwlockattr_destroy(attr: *mut c_void) => RwlockattrDestroy;
    prs_pthread_rwlockattr_getpshared(attr: *const c_void, pshared: *mut c_int) => RwlockattrGetPshared;
    prs_pthread_rwlockattr_setpshared(attr: *mut c_void, pshared: c_int) => RwlockattrSetPshared;
}

/// POSIX `pthread_testcancel`: cancellation can never be requested, so this
/// never acts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_testcancel() {
    global_runtime().testcancel();
}

/// POSIX `pthread_attr_init`. The object is opaque and never read.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_attr_init(attr: *mut c_void) -> c_int {
    if attr.is_null() { EINVAL } else { 0 }
}

/// POSIX `pthread_attr_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_attr_destroy(attr: *mut c_void) -> c_int {
    if attr.is_null() { EINVAL } else { 0 }
}
