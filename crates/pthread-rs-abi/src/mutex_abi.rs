//! Mutex and mutex-attribute exports.

use std::ffi::c_int;

use pthread_rs_core::errno::EINVAL;
use pthread_rs_core::{MutexAttr, MutexHandle, UnsupportedOp};

use crate::runtime_state::{global_runtime, rc};
use crate::{PrsMutex, PrsMutexAttr};

fn handle_at(mutex: *const PrsMutex) -> Option<MutexHandle> {
    if mutex.is_null() {
        return None;
    }
    // SAFETY: non-null, caller-provided mutex storage.
    MutexHandle::from_raw(unsafe { *mutex })
}

/// POSIX `pthread_mutexattr_init`: type NORMAL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutexattr_init(attr: *mut PrsMutexAttr) -> c_int {
    if attr.is_null() {
        return EINVAL;
    }
    // SAFETY: non-null, caller-provided attribute storage.
    unsafe {
        (*attr).kind = MutexAttr::new().get_type();
    }
    0
}

/// POSIX `pthread_mutexattr_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutexattr_destroy(attr: *mut PrsMutexAttr) -> c_int {
    if attr.is_null() { EINVAL } else { 0 }
}

/// POSIX `pthread_mutexattr_settype`. EINVAL for an unknown type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutexattr_settype(
    attr: *mut PrsMutexAttr,
    kind: c_int,
) -> c_int {
    if attr.is_null() {
        return EINVAL;
    }
    let mut parsed = MutexAttr::new();
    if let Err(err) = parsed.set_type(kind) {
        return err.errno();
    }
    // SAFETY: non-null, caller-provided attribute storage.
    unsafe {
        (*attr).kind = parsed.get_type();
    }
    0
}

/// POSIX `pthread_mutexattr_gettype`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutexattr_gettype(
    attr: *const PrsMutexAttr,
    kind: *mut c_int,
) -> c_int {
    if attr.is_null() || kind.is_null() {
        return EINVAL;
    }
    // SAFETY: both pointers checked non-null above.
    unsafe {
        *kind = (*attr).kind;
    }
    0
}

/// POSIX `pthread_mutexattr_setpshared`: process-shared mutexes are unsupported.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutexattr_setpshared(
    _attr: *mut PrsMutexAttr,
    _pshared: c_int,
) -> c_int {
    rc(UnsupportedOp::MutexattrSetPshared.invoke())
}

/// POSIX `pthread_mutex_init`. A null `attr` means NORMAL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutex_init(
    mutex: *mut PrsMutex,
    attr: *const PrsMutexAttr,
) -> c_int {
    if mutex.is_null() {
        return EINVAL;
    }
    let mut parsed = MutexAttr::new();
    if !attr.is_null() {
        // SAFETY: non-null, caller-provided attribute storage.
        let kind = unsafe { (*attr).kind };
        if let Err(err) = parsed.set_type(kind) {
            return err.errno();
        }
    }
    let handle = global_runtime().mutex_init_with(&parsed);
    // SAFETY: `mutex` checked non-null above.
    unsafe {
        *mutex = handle.into_raw();
    }
    0
}

/// POSIX `pthread_mutex_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutex_destroy(mutex: *mut PrsMutex) -> c_int {
    let Some(handle) = handle_at(mutex) else {
        return EINVAL;
    };
    let result = global_runtime().mutex_destroy(handle);
    if result.is_ok() {
        // SAFETY: `handle_at` only succeeds for non-null storage.
        unsafe {
            *mutex = 0;
        }
    }
    rc(result)
}

/// POSIX `pthread_mutex_lock`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutex_lock(mutex: *mut PrsMutex) -> c_int {
    match handle_at(mutex) {
        Some(handle) => rc(global_runtime().mutex_lock(handle)),
        None => EINVAL,
    }
}

/// POSIX `pthread_mutex_trylock`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutex_trylock(mutex: *mut PrsMutex) -> c_int {
    match handle_at(mutex) {
        Some(handle) => rc(global_runtime().mutex_trylock(handle)),
        None => EINVAL,
    }
}

/// POSIX `pthread_mutex_unlock`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_mutex_unlock(mutex: *mut PrsMutex) -> c_int {
    match handle_at(mutex) {
        Some(handle) => rc(global_runtime().mutex_unlock(handle)),
        None => EINVAL,
    }
}
