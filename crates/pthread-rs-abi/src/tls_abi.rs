//! Thread-specific data exports.

use std::ffi::{c_int, c_void};
use std::sync::Arc;

use pthread_rs_core::errno::EINVAL;
use pthread_rs_core::{Destructor, KeyHandle};

use crate::PrsKey;
use crate::runtime_state::{global_runtime, rc};

pub type KeyDestructor = unsafe extern "C" fn(*mut c_void);

/// POSIX `pthread_key_create`. `EAGAIN` once the key limit is reached.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_key_create(
    key: *mut PrsKey,
    destructor: Option<KeyDestructor>,
) -> c_int {
    if key.is_null() {
        return EINVAL;
    }
    let destructor = destructor.map(|d| -> Destructor {
        Arc::new(move |value| {
            // SAFETY: the caller registered `d` as a destructor for this key.
            unsafe { d(value as *mut c_void) }
        })
    });
    match global_runtime().key_create(destructor) {
        Ok(handle) => {
            // SAFETY: `key` checked non-null above.
            unsafe { *key = handle.into_raw() };
            0
        }
        Err(err) => err.errno(),
    }
}

/// POSIX `pthread_key_delete`. Destructors are not run.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_key_delete(key: PrsKey) -> c_int {
    match KeyHandle::from_raw(key) {
        Some(handle) => rc(global_runtime().key_delete(handle)),
        None => EINVAL,
    }
}

/// POSIX `pthread_setspecific`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_setspecific(key: PrsKey, value: *const c_void) -> c_int {
    match KeyHandle::from_raw(key) {
        Some(handle) => rc(global_runtime().set_specific(handle, value as usize)),
        None => EINVAL,
    }
}

/// POSIX `pthread_getspecific`. Null for an unset value or an invalid key.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_getspecific(key: PrsKey) -> *mut c_void {
    KeyHandle::from_raw(key)
        .and_then(|handle| global_runtime().get_specific(handle).ok().flatten())
        .unwrap_or(0) as *mut c_void
}
