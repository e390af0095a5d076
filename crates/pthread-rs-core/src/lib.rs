//! # pthread-rs-core
//!
//! Safe Rust implementation of a partial POSIX-threads surface.
//!
//! Everything hangs off an explicit [`Runtime`] context: threads, mutexes,
//! condition variables and thread-local keys are addressed through
//! generation-checked handles owned by that runtime. Several runtimes can
//! coexist in one process without sharing state. No `unsafe` code is
//! permitted at the crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod errno;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod pthread;
mod runtime;

pub use config::RuntimeConfig;
pub use error::{Result, ThreadError};
pub use handle::{CondHandle, KeyHandle, MutexHandle, ThreadHandle};
pub use metrics::MetricsSnapshot;
pub use pthread::{Destructor, MutexAttr, MutexKind, OnceControl, UnsupportedOp};
pub use runtime::Runtime;
