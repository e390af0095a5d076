//! Conformance harness for pthread-rs.
//!
//! This crate provides:
//! - Scenarios: the threading corpus programs, run against a fresh runtime
//! - Fixtures: expected output per scenario, as JSON fixture sets
//! - Runner: executes fixtures under a watchdog and verifies output
//! - Gate probe: checks every unsupported operation rejects without side effects
//! - Reports and structured JSONL logs with artifact hashes

#![forbid(unsafe_code)]

pub mod diff;
pub mod error;
pub mod fixtures;
pub mod gate_probe;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod structured_log;
pub mod verify;

pub use error::HarnessError;
pub use fixtures::{FixtureCase, FixtureSet};
pub use report::ConformanceReport;
pub use runner::TestRunner;
pub use verify::{VerificationResult, VerificationSummary};
