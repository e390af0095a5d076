//! Condition variable exports.

use std::ffi::{c_int, c_void};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pthread_rs_core::errno::EINVAL;
use pthread_rs_core::{CondHandle, MutexHandle};

use crate::runtime_state::{global_runtime, rc};
use crate::{PrsCond, PrsMutex};

fn cond_at(cond: *const PrsCond) -> Option<CondHandle> {
    if cond.is_null() {
        return None;
    }
    // SAFETY: non-null, caller-provided condvar storage.
    CondHandle::from_raw(unsafe { *cond })
}

fn mutex_at(mutex: *const PrsMutex) -> Option<MutexHandle> {
    if mutex.is_null() {
        return None;
    }
    // SAFETY: non-null, caller-provided mutex storage.
    MutexHandle::from_raw(unsafe { *mutex })
}

/// Map an absolute `CLOCK_REALTIME` timespec onto the monotonic clock.
/// `None` for a malformed nanosecond field.
fn deadline_from_abstime(abstime: &libc::timespec) -> Option<Instant> {
    if abstime.tv_sec < 0 || !(0..1_000_000_000).contains(&abstime.tv_nsec) {
        return None;
    }
    let target = UNIX_EPOCH + Duration::new(abstime.tv_sec as u64, abstime.tv_nsec as u32);
    let remaining = target
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO);
    let now = Instant::now();
    Some(now.checked_add(remaining).unwrap_or(now + Duration::from_secs(u32::MAX as u64)))
}

/// POSIX `pthread_cond_init`. Attributes are not supported and ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_init(cond: *mut PrsCond, _attr: *const c_void) -> c_int {
    if cond.is_null() {
        return EINVAL;
    }
    let handle = global_runtime().cond_init();
    // SAFETY: `cond` checked non-null above.
    unsafe {
        *cond = handle.into_raw();
    }
    0
}

/// POSIX `pthread_cond_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_destroy(cond: *mut PrsCond) -> c_int {
    let Some(handle) = cond_at(cond) else {
        return EINVAL;
    };
    let result = global_runtime().cond_destroy(handle);
    if result.is_ok() {
        // SAFETY: `cond_at` only succeeds for non-null storage.
        unsafe {
            *cond = 0;
        }
    }
    rc(result)
}

/// POSIX `pthread_cond_wait`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_wait(cond: *mut PrsCond, mutex: *mut PrsMutex) -> c_int {
    match (cond_at(cond), mutex_at(mutex)) {
        (Some(c), Some(m)) => rc(global_runtime().cond_wait(c, m)),
        _ => EINVAL,
    }
}

/// POSIX `pthread_cond_timedwait` with an absolute `CLOCK_REALTIME` deadline.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_timedwait(
    cond: *mut PrsCond,
    mutex: *mut PrsMutex,
    abstime: *const libc::timespec,
) -> c_int {
    if abstime.is_null() {
        return EINVAL;
    }
    // SAFETY: checked non-null above.
    let Some(deadline) = deadline_from_abstime(unsafe { &*abstime }) else {
        return EINVAL;
    };
    match (cond_at(cond), mutex_at(mutex)) {
        (Some(c), Some(m)) => rc(global_runtime().cond_timedwait(c, m, deadline)),
        _ => EINVAL,
    }
}

/// POSIX `pthread_cond_signal`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_signal(cond: *mut PrsCond) -> c_int {
    match cond_at(cond) {
        Some(c) => rc(global_runtime().cond_signal(c)),
        None => EINVAL,
    }
}

/// POSIX `pthread_cond_broadcast`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prs_pthread_cond_broadcast(cond: *mut PrsCond) -> c_int {
    match cond_at(cond) {
        Some(c) => rc(global_runtime().cond_broadcast(c)),
        None => EINVAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_abstime_is_already_due() {
        let ts = libc::timespec {
            tv_sec: 1,
            tv_nsec: 0,
        };
        let deadline = deadline_from_abstime(&ts).unwrap();
        assert!(deadline <= Instant::now());
    }

    #[test]
    fn malformed_nanoseconds_are_rejected() {
        let ts = libc::timespec {
            tv_sec: 1,
            tv_nsec: 1_000_000_000,
        };
        assert!(deadline_from_abstime(&ts).is_none());
    }
}
