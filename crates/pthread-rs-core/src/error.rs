//! Error catalog for the threading runtime.

use crate::errno;
use crate::pthread::UnsupportedOp;

/// Every failure a threading operation can report.
///
/// Each variant maps onto exactly one errno value through [`ThreadError::errno`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    /// The resource is held and the call would have to block.
    #[error("resource busy")]
    Busy,
    /// Stale handle, bad argument, or a join/detach on a thread that no
    /// longer accepts one.
    #[error("invalid argument")]
    Invalid,
    /// The call would deadlock the caller.
    #[error("resource deadlock would occur")]
    Deadlock,
    /// The caller does not own the resource.
    #[error("operation not permitted")]
    NotPermitted,
    /// A timed wait reached its deadline.
    #[error("timed out")]
    TimedOut,
    /// The operation is outside the implemented surface.
    #[error("{0} is not supported")]
    Unsupported(UnsupportedOp),
    /// A thread or key limit was reached.
    #[error("resource temporarily unavailable")]
    ResourceExhausted,
}

impl ThreadError {
    /// Numeric errno for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::Busy => errno::EBUSY,
            Self::Invalid => errno::EINVAL,
            Self::Deadlock => errno::EDEADLK,
            Self::NotPermitted => errno::EPERM,
            Self::TimedOut => errno::ETIMEDOUT,
            Self::Unsupported(_) => errno::ENOTSUP,
            Self::ResourceExhausted => errno::EAGAIN,
        }
    }

    /// Inverse of [`ThreadError::errno`]. `ENOTSUP` carries no operation, so it
    /// is not recoverable here and yields `None` like any unknown code.
    #[must_use]
    pub const fn from_errno(code: i32) -> Option<Self> {
        match code {
            errno::EBUSY => Some(Self::Busy),
            errno::EINVAL => Some(Self::Invalid),
            errno::EDEADLK => Some(Self::Deadlock),
            errno::EPERM => Some(Self::NotPermitted),
            errno::ETIMEDOUT => Some(Self::TimedOut),
            errno::EAGAIN => Some(Self::ResourceExhausted),
            _ => None,
        }
    }
}

/// Result alias used across the runtime.
pub type Result<T> = core::result::Result<T, ThreadError>;

/// Collapse a unit result into the C convention: 0 or an errno.
#[must_use]
pub fn errno_of(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.errno(),
    }
}
