//! Probe of the unsupported-operation gate.
//!
//! Every catalogued operation must fail with ENOTSUP and leave the runtime
//! exactly as it was. `pthread_testcancel` must succeed as a no-op.

use pthread_rs_core::errno::ENOTSUP;
use pthread_rs_core::error::errno_of;
use pthread_rs_core::{MetricsSnapshot, Runtime, UnsupportedOp};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateProbe {
    pub symbol: String,
    pub errno: i32,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateProbeReport {
    pub probes: Vec<GateProbe>,
    /// Object counts and metrics matched before and after probing.
    pub state_unchanged: bool,
}

impl GateProbeReport {
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.probes.iter().filter(|p| p.passed).count()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.state_unchanged && self.rejected() == self.probes.len()
    }

    /// Emit one `gate_probe` line per probed symbol.
    pub fn emit(&self, log: &mut LogEmitter) -> Result<(), HarnessError> {
        for p in &self.probes {
            let (level, outcome) = if p.passed {
                (LogLevel::Info, Outcome::Pass)
            } else {
                (LogLevel::Error, Outcome::Fail)
            };
            let entry = log
                .entry(level, "gate_probe")
                .with_symbol(p.symbol.clone())
                .with_outcome(outcome)
                .with_errno(p.errno);
            log.emit_entry(&entry)?;
        }
        log.flush()
    }
}

#[derive(PartialEq, Eq)]
struct StateFingerprint {
    metrics: MetricsSnapshot,
    counts: [usize; 4],
}

impl StateFingerprint {
    fn take(rt: &Runtime) -> Self {
        Self {
            metrics: rt.metrics(),
            counts: [
                rt.thread_count(),
                rt.mutex_count(),
                rt.cond_count(),
                rt.key_count(),
            ],
        }
    }
}

/// Invoke every unsupported operation on `rt`, then `testcancel`.
pub fn probe(rt: &Runtime) -> GateProbeReport {
    probe_ops(rt, UnsupportedOp::ALL)
}

/// Invoke only `ops`, then `testcancel`.
pub fn probe_ops(rt: &Runtime, ops: &[UnsupportedOp]) -> GateProbeReport {
    let before = StateFingerprint::take(rt);
    let probes = ops
        .iter()
        .map(|&op| {
            let errno = errno_of(rt.unsupported(op));
            GateProbe {
                symbol: op.symbol().to_string(),
                errno,
                passed: errno == ENOTSUP,
            }
        })
        .collect();
    rt.testcancel();
    GateProbeReport {
        probes,
        state_unchanged: before == StateFingerprint::take(rt),
    }
}
