//! Error number definitions.
//!
//! Only the codes the threading surface can return. Values match Linux.

/// Operation not permitted (unlock of a mutex the caller does not own).
pub const EPERM: i32 = 1;
/// Resource temporarily unavailable (thread or key limit reached).
pub const EAGAIN: i32 = 11;
/// Device or resource busy.
pub const EBUSY: i32 = 16;
/// Invalid argument.
pub const EINVAL: i32 = 22;
/// Resource deadlock would occur.
pub const EDEADLK: i32 = 35;
/// Operation not supported.
pub const ENOTSUP: i32 = 95;
/// Connection timed out; used by timed condition waits.
pub const ETIMEDOUT: i32 = 110;

/// Symbolic name for an errno value, or `"0"` for success.
#[must_use]
pub const fn errno_name(code: i32) -> &'static str {
    match code {
        0 => "0",
        EPERM => "EPERM",
        EAGAIN => "EAGAIN",
        EBUSY => "EBUSY",
        EINVAL => "EINVAL",
        EDEADLK => "EDEADLK",
        ENOTSUP => "ENOTSUP",
        ETIMEDOUT => "ETIMEDOUT",
        _ => "EUNKNOWN",
    }
}
