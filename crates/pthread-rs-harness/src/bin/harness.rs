//! CLI entrypoint for the pthread-rs conformance harness.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use pthread_rs_core::{Runtime, UnsupportedOp};
use pthread_rs_harness::gate_probe;
use pthread_rs_harness::structured_log::{self, ArtifactIndex, LogEmitter};
use pthread_rs_harness::{
    ConformanceReport, FixtureSet, HarnessError, TestRunner, VerificationSummary,
};

/// Conformance tooling for pthread-rs.
#[derive(Debug, Parser)]
#[command(name = "pthread-rs-harness")]
#[command(about = "Conformance testing harness for pthread-rs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run fixture cases against fresh runtimes.
    Run {
        /// Fixture JSON file (defaults to the built-in set).
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Campaign name used in trace ids.
        #[arg(long, default_value = "corpus")]
        campaign: String,
        /// Only run cases whose name contains this string.
        #[arg(long)]
        filter: Option<String>,
        /// Per-case watchdog in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
        /// Output report path (markdown).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Output report path (JSON).
        #[arg(long)]
        json: Option<PathBuf>,
        /// JSONL structured log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index path; hashes every file written by this run.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// List registered scenarios.
    List,
    /// Write the built-in fixture set as JSON.
    ExportFixtures {
        #[arg(long)]
        output: PathBuf,
    },
    /// Check that every unsupported operation returns ENOTSUP.
    ProbeUnsupported {
        /// Print the full probe report as JSON.
        #[arg(long)]
        json: bool,
        /// Probe only this POSIX symbol (repeatable).
        #[arg(long = "symbol")]
        symbols: Vec<String>,
    },
    /// Validate a JSONL structured log.
    ValidateLog { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            fixture,
            campaign,
            filter,
            timeout_ms,
            report,
            json,
            log,
            artifacts,
        } => {
            let mut set = match &fixture {
                Some(path) => FixtureSet::from_file(path)?,
                None => FixtureSet::builtin(),
            };
            if let Some(pattern) = &filter {
                set = set.filtered(pattern);
            }
            eprintln!("Running {} {} cases", set.cases.len(), set.family);

            let runner =
                TestRunner::new(campaign.clone()).with_timeout(Duration::from_millis(timeout_ms));
            let run_id = run_id();
            let mut emitter = match &log {
                Some(path) => Some(LogEmitter::to_file(path, &campaign, &run_id)?),
                None => None,
            };
            let results = match emitter.as_mut() {
                Some(emitter) => runner.run_logged(&set, emitter)?,
                None => runner.run(&set),
            };
            let summary = VerificationSummary::from_results(results);
            for r in summary.results.iter().filter(|r| !r.passed) {
                eprintln!("FAIL {}", r.case_name);
                if let Some(diff) = &r.diff {
                    eprintln!("{diff}");
                }
            }

            let doc = ConformanceReport {
                title: "pthread-rs conformance".to_string(),
                campaign,
                timestamp: structured_log::now_utc(),
                summary: summary.clone(),
                gate_probe: Some(gate_probe::probe(&Runtime::new())),
            };
            if let (Some(emitter), Some(probe)) = (emitter.as_mut(), doc.gate_probe.as_ref()) {
                probe.emit(emitter)?;
            }
            drop(emitter);
            let mut written = Vec::new();
            if let Some(path) = &report {
                write_file(path, &doc.to_markdown())?;
                written.push((path.clone(), "report"));
            }
            if let Some(path) = &json {
                write_file(path, &doc.to_json())?;
                written.push((path.clone(), "report"));
            }
            if let Some(path) = &log {
                written.push((path.clone(), "log"));
            }
            if let Some(index_path) = &artifacts {
                let mut index = ArtifactIndex::new(run_id);
                for (path, kind) in &written {
                    index.add_file(path, *kind, None)?;
                }
                write_file(index_path, &index.to_json())?;
            }

            eprintln!(
                "Passed: {}/{} ({} failed)",
                summary.passed, summary.total, summary.failed
            );
            if !summary.all_passed() {
                return Err(HarnessError::Verification {
                    failed: summary.failed,
                    total: summary.total,
                }
                .into());
            }
        }
        Command::List => {
            for name in pthread_rs_harness::scenarios::names() {
                println!("{name}");
            }
        }
        Command::ExportFixtures { output } => {
            write_file(&output, &FixtureSet::builtin().to_json())?;
            eprintln!("Wrote {}", output.display());
        }
        Command::ProbeUnsupported { json, symbols } => {
            let rt = Runtime::new();
            let report = if symbols.is_empty() {
                gate_probe::probe(&rt)
            } else {
                let ops = symbols
                    .iter()
                    .map(|s| {
                        UnsupportedOp::from_symbol(s)
                            .ok_or_else(|| format!("{s} is not an unsupported operation"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                gate_probe::probe_ops(&rt, &ops)
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for p in report.probes.iter().filter(|p| !p.passed) {
                    println!("FAIL {} returned {}", p.symbol, p.errno);
                }
                println!(
                    "{}/{} rejected with ENOTSUP, state unchanged: {}",
                    report.rejected(),
                    report.probes.len(),
                    report.state_unchanged
                );
            }
            if !report.all_passed() {
                return Err("unsupported gate probe failed".into());
            }
        }
        Command::ValidateLog { path } => {
            let (valid, errors) = structured_log::validate_log_file(&path)?;
            for e in &errors {
                eprintln!("{e}");
            }
            println!("{valid} valid line(s), {} error(s)", errors.len());
            if !errors.is_empty() {
                return Err(format!("{} invalid log line(s)", errors.len()).into());
            }
        }
    }

    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| HarnessError::io(path, e))
}

fn run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("run-{millis}")
}
