//! Thread lifecycle exports.

use std::collections::HashMap;
use std::ffi::{c_int, c_void};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use pthread_rs_core::errno::EINVAL;
use pthread_rs_core::{OnceControl, ThreadHandle};

use crate::runtime_state::global_runtime;
use crate::{PrsOnce, PrsThread};

/// Start routine. `C-unwind` so that [`prs_pthread_exit`] can unwind out of it.
pub type StartRoutine = unsafe extern "C-unwind" fn(*mut c_void) -> *mut c_void;
/// Init routine for [`prs_pthread_once`].
pub type InitRoutine = unsafe extern "C-unwind" fn();

type OnceTable = HashMap<usize, Arc<OnceControl>>;

fn once_table() -> &'static Mutex<OnceTable> {
    static TABLE: OnceLock<Mutex<OnceTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_once_table() -> MutexGuard<'static, OnceTable> {
    match once_table().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// POSIX `pthread_create`. Attributes are accepted and ignored.
///
/// Returns `0` on success, `EINVAL` for a null output or routine, `EAGAIN`
/// when no thread can be started.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_create(
    thread_out: *mut PrsThread,
    _attr: *const c_void,
    start_routine: Option<StartRoutine>,
    arg: *mut c_void,
) -> c_int {
    let Some(start) = start_routine else {
        return EINVAL;
    };
    if thread_out.is_null() {
        return EINVAL;
    }
    let arg_addr = arg as usize;
    let spawned = global_runtime().create(
        move |arg| {
            // SAFETY: pthread_create contract supplies a valid start routine.
            let retval = unsafe { start(arg as *mut c_void) };
            retval as usize
        },
        arg_addr,
    );
    match spawned {
        Ok(handle) => {
            // SAFETY: `thread_out` was checked non-null above.
            unsafe { *thread_out = handle.into_raw() };
            0
        }
        Err(err) => err.errno(),
    }
}

/// POSIX `pthread_join`. `retval` may be null.
///
/// A thread whose start routine panicked is joined normally with a null
/// exit value; the panic never crosses this boundary.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_join(thread: PrsThread, retval: *mut *mut c_void) -> c_int {
    let Some(handle) = ThreadHandle::from_raw(thread) else {
        return EINVAL;
    };
    match global_runtime().try_join(handle) {
        Ok(joined) => {
            let value = joined.unwrap_or_else(|_| {
                tracing::warn!(thread, "joined thread whose start routine panicked");
                0
            });
            if !retval.is_null() {
                // SAFETY: caller-provided output pointer.
                unsafe { *retval = value as *mut c_void };
            }
            0
        }
        Err(err) => err.errno(),
    }
}

/// POSIX `pthread_detach`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_detach(thread: PrsThread) -> c_int {
    match ThreadHandle::from_raw(thread) {
        Some(handle) => crate::runtime_state::rc(global_runtime().detach(handle)),
        None => EINVAL,
    }
}

/// POSIX `pthread_exit`. Unwinds to the thread's start trampoline.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn prs_pthread_exit(value: *mut c_void) -> ! {
    global_runtime().exit(value as usize)
}

/// POSIX `pthread_self`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_self() -> PrsThread {
    global_runtime().self_handle().into_raw()
}

/// POSIX `pthread_equal`: nonzero when both name the same thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_equal(a: PrsThread, b: PrsThread) -> c_int {
    c_int::from(a == b)
}

/// POSIX `pthread_once`. The control is identified by its address.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn prs_pthread_once(
    once_control: *mut PrsOnce,
    init_routine: Option<InitRoutine>,
) -> c_int {
    let Some(init) = init_routine else {
        return EINVAL;
    };
    if once_control.is_null() {
        return EINVAL;
    }
    let control = Arc::clone(
        lock_once_table()
            .entry(once_control as usize)
            .or_insert_with(|| Arc::new(OnceControl::new())),
    );
    // SAFETY: caller supplies a valid init routine.
    global_runtime().once(&control, || unsafe { init() });
    0
}
