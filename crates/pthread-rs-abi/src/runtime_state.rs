//! The process-global runtime behind every exported symbol.

use std::ffi::c_int;
use std::sync::OnceLock;

use pthread_rs_core::error::errno_of;
use pthread_rs_core::{MetricsSnapshot, Result, Runtime};

/// Global runtime, configured from the `PTHREAD_RS_*` environment on first use.
pub fn global_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(Runtime::from_env)
}

pub(crate) fn rc(result: Result<()>) -> c_int {
    errno_of(result)
}

#[doc(hidden)]
pub fn metrics_for_tests() -> MetricsSnapshot {
    global_runtime().metrics()
}
