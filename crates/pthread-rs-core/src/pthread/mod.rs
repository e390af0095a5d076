//! POSIX threads.
//!
//! Each submodule adds its operations to [`crate::Runtime`] and keeps the
//! per-object state it needs.

pub mod cond;
pub mod mutex;
pub mod once;
pub mod thread;
pub mod tls;
pub mod unsupported;

pub use mutex::{
    MutexAttr, MutexKind, PTHREAD_MUTEX_DEFAULT, PTHREAD_MUTEX_ERRORCHECK, PTHREAD_MUTEX_NORMAL,
    PTHREAD_MUTEX_RECURSIVE,
};
pub use once::OnceControl;
pub use tls::Destructor;
pub use unsupported::UnsupportedOp;
