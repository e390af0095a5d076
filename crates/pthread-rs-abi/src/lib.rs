// Every export takes raw pointers from C callers and checks them for null
// before use; per-function safety docs would repeat that for each symbol.
#![allow(clippy::missing_safety_doc)]
//! # pthread-rs-abi
//!
//! `extern "C"` boundary over `pthread-rs-core`.
//!
//! ```text
//! C caller -> prs_pthread_* entry (this crate) -> process-global Runtime -> return errno
//! ```
//!
//! Symbols carry a `prs_` prefix so the library can be linked next to the
//! host libc. Objects cross the boundary as packed 64-bit handles; the value
//! 0 is never a valid handle. Every function that returns `c_int` returns 0
//! on success or an errno value; none of them touch the C `errno`.

pub mod cond_abi;
pub mod mutex_abi;
pub mod runtime_state;
pub mod thread_abi;
pub mod tls_abi;
pub mod unsupported_abi;

/// Thread handle as seen by C.
pub type PrsThread = u64;
/// Mutex handle storage.
pub type PrsMutex = u64;
/// Condition variable handle storage.
pub type PrsCond = u64;
/// Thread-local key.
pub type PrsKey = u64;
/// Once control; initialize with [`PRS_ONCE_INIT`]. Identified by address.
pub type PrsOnce = libc::c_int;

pub const PRS_ONCE_INIT: PrsOnce = 0;

/// Mutex attribute object. Only the type is stored.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PrsMutexAttr {
    pub kind: libc::c_int,
}
