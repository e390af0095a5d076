//! Test execution engine.
//!
//! Each fixture case runs its scenario on a dedicated thread against a
//! fresh [`Runtime`]. A watchdog bounds the run; a scenario that deadlocks
//! is reported as a timeout and its thread is abandoned.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use pthread_rs_core::{MetricsSnapshot, Runtime, ThreadError};

use crate::diff::render_diff;
use crate::error::HarnessError;
use crate::fixtures::{FixtureCase, FixtureSet};
use crate::scenarios::{self, ScenarioOutput};
use crate::structured_log::{LogEmitter, LogLevel, Outcome};
use crate::verify::VerificationResult;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a scenario run ended.
#[derive(Debug)]
pub enum Execution {
    Finished(ScenarioOutput, MetricsSnapshot),
    Failed(ThreadError),
    Panicked,
    TimedOut,
    Unknown(String),
}

impl Execution {
    fn outcome(&self, passed: bool) -> Outcome {
        match self {
            Self::Finished(..) if passed => Outcome::Pass,
            Self::Finished(..) => Outcome::Fail,
            Self::TimedOut => Outcome::Timeout,
            Self::Failed(_) | Self::Panicked | Self::Unknown(_) => Outcome::Error,
        }
    }
}

/// One executed case.
#[derive(Debug)]
pub struct CaseRun {
    pub result: VerificationResult,
    pub execution: Execution,
}

impl CaseRun {
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.execution.outcome(self.result.passed)
    }
}

/// Runs fixture sets against fresh runtimes.
pub struct TestRunner {
    campaign: String,
    timeout: Duration,
}

impl TestRunner {
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn campaign(&self) -> &str {
        &self.campaign
    }

    /// Run all cases in a fixture set.
    #[must_use]
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<VerificationResult> {
        fixture_set
            .cases
            .iter()
            .map(|case| self.run_case(case).result)
            .collect()
    }

    /// Run all cases, emitting one `case_result` line per case.
    pub fn run_logged(
        &self,
        fixture_set: &FixtureSet,
        log: &mut LogEmitter,
    ) -> Result<Vec<VerificationResult>, HarnessError> {
        let start = log
            .entry(LogLevel::Info, "run_start")
            .with_details(serde_json::json!({
                "family": fixture_set.family,
                "cases": fixture_set.cases.len(),
            }));
        log.emit_entry(&start)?;

        let mut results = Vec::with_capacity(fixture_set.cases.len());
        for case in &fixture_set.cases {
            let run = self.run_case(case);
            let outcome = run.outcome();
            let level = if outcome == Outcome::Pass {
                LogLevel::Info
            } else {
                LogLevel::Error
            };
            let mut entry = log
                .entry(level, "case_result")
                .with_scenario(case.scenario.clone())
                .with_outcome(outcome)
                .with_duration_ms(run.result.duration_ms);
            match &run.execution {
                Execution::Finished(output, metrics) => {
                    entry = entry
                        .with_exit_code(output.exit_code)
                        .with_details(metrics_json(metrics));
                }
                Execution::Failed(err) => entry = entry.with_errno(err.errno()),
                _ => {}
            }
            log.emit_entry(&entry)?;
            results.push(run.result);
        }
        log.flush()?;
        Ok(results)
    }

    /// Run and verify a single case.
    #[must_use]
    pub fn run_case(&self, case: &FixtureCase) -> CaseRun {
        let started = Instant::now();
        let execution = self.execute(&case.scenario);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let expected = case.expected();
        let actual = match &execution {
            Execution::Finished(output, _) => output.render(),
            Execution::Failed(err) => format!("error: {err} (errno {})\n", err.errno()),
            Execution::Panicked => "panicked\n".to_string(),
            Execution::TimedOut => format!("timeout after {}ms\n", self.timeout.as_millis()),
            Execution::Unknown(name) => format!("unsupported:unknown scenario '{name}'\n"),
        };
        let passed = matches!(execution, Execution::Finished(..)) && expected == actual;
        let diff = (!passed).then(|| render_diff(&expected, &actual));

        CaseRun {
            result: VerificationResult {
                case_name: case.name.clone(),
                posix_section: case.posix_section.clone(),
                passed,
                expected,
                actual,
                diff,
                duration_ms,
            },
            execution,
        }
    }

    fn execute(&self, name: &str) -> Execution {
        let Some(scenario) = scenarios::lookup(name) else {
            return Execution::Unknown(name.to_string());
        };

        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name(format!("scenario-{name}"))
            .spawn(move || {
                let rt = Runtime::new();
                let result = scenario(&rt).map(|output| (output, rt.metrics()));
                // The receiver is gone only after a timeout.
                let _ = tx.send(result);
            });
        let Ok(handle) = spawned else {
            return Execution::Failed(ThreadError::ResourceExhausted);
        };

        match rx.recv_timeout(self.timeout) {
            Ok(result) => {
                let _ = handle.join();
                match result {
                    Ok((output, metrics)) => Execution::Finished(output, metrics),
                    Err(err) => Execution::Failed(err),
                }
            }
            Err(RecvTimeoutError::Timeout) => Execution::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Execution::Panicked,
        }
    }
}

fn metrics_json(m: &MetricsSnapshot) -> serde_json::Value {
    serde_json::json!({
        "threads_created": m.threads_created,
        "threads_joined": m.threads_joined,
        "threads_detached": m.threads_detached,
        "threads_exited": m.threads_exited,
        "mutex_contended": m.mutex_contended,
        "cond_waits": m.cond_waits,
        "cond_timeouts": m.cond_timeouts,
        "destructors_run": m.destructors_run,
    })
}
