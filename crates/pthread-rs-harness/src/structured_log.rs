//! Structured JSONL logging for harness runs.
//!
//! Provides:
//! - [`LogEntry`]: one JSONL record with required and optional fields.
//! - [`ArtifactIndex`]: ties a run's report files to their SHA-256 digests.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`] and [`validate_log_file`]: schema checks.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HarnessError;

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
    Timeout,
}

/// Structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            campaign: None,
            scenario: None,
            symbol: None,
            outcome: None,
            errno: None,
            exit_code: None,
            duration_ms: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    #[must_use]
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    /// Artifact kind (e.g., "report", "log", "fixtures").
    pub kind: String,
    pub sha256: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Hash `path` and record it.
    pub fn add_file(
        &mut self,
        path: &Path,
        kind: impl Into<String>,
        description: Option<String>,
    ) -> Result<(), HarnessError> {
        let bytes = std::fs::read(path).map_err(|e| HarnessError::io(path, e))?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&bytes),
            size_bytes: bytes.len() as u64,
            description,
        });
        Ok(())
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Cloneable in-memory sink for a [`LogEmitter`].
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// JSONL writer with sequential trace ids of the form
/// `<campaign>::<run_id>::<seq>`.
pub struct LogEmitter {
    writer: Box<dyn Write + Send>,
    seq: u64,
    campaign: String,
    run_id: String,
}

impl LogEmitter {
    pub fn to_file(path: &Path, campaign: &str, run_id: &str) -> Result<Self, HarnessError> {
        let file = std::fs::File::create(path).map_err(|e| HarnessError::io(path, e))?;
        Ok(Self::to_writer(
            Box::new(std::io::BufWriter::new(file)),
            campaign,
            run_id,
        ))
    }

    #[must_use]
    pub fn to_buffer(campaign: &str, run_id: &str) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        (
            Self::to_writer(Box::new(buffer.clone()), campaign, run_id),
            buffer,
        )
    }

    #[must_use]
    pub fn to_writer(writer: Box<dyn Write + Send>, campaign: &str, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            campaign: campaign.to_string(),
            run_id: run_id.to_string(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.campaign, self.run_id, self.seq)
    }

    /// Start an entry carrying the next trace id and this emitter's campaign.
    pub fn entry(&mut self, level: LogLevel, event: &str) -> LogEntry {
        let trace_id = self.next_trace_id();
        LogEntry::new(trace_id, level, event).with_campaign(self.campaign.clone())
    }

    pub fn emit_entry(&mut self, entry: &LogEntry) -> Result<(), HarnessError> {
        let line = entry.to_jsonl()?;
        writeln!(self.writer, "{line}").map_err(|e| HarnessError::io("<log>", e))
    }

    pub fn flush(&mut self) -> Result<(), HarnessError> {
        self.writer
            .flush()
            .map_err(|e| HarnessError::io("<log>", e))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}: {}", self.line_number, self.field, self.message)
    }
}

const REQUIRED_FIELDS: &[&str] = &["timestamp", "trace_id", "level", "event"];
const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const OUTCOMES: &[&str] = &["pass", "fail", "error", "timeout"];

/// Validate one JSONL line. `line_number` is only used in error reports.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let err = |field: &str, message: String| LogValidationError {
        line_number,
        field: field.to_string(),
        message,
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Err(vec![err("<json>", e.to_string())]),
    };
    let Some(obj) = value.as_object() else {
        return Err(vec![err("<json>", "expected an object".to_string())]);
    };

    let mut errors = Vec::new();
    for &field in REQUIRED_FIELDS {
        match obj.get(field).and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => {}
            _ => errors.push(err(field, "required non-empty string".to_string())),
        }
    }
    if let Some(level) = obj.get("level").and_then(|v| v.as_str()) {
        if !LEVELS.contains(&level) {
            errors.push(err("level", format!("unknown level '{level}'")));
        }
    }
    if let Some(outcome) = obj.get("outcome") {
        match outcome.as_str() {
            Some(o) if OUTCOMES.contains(&o) => {}
            _ => errors.push(err("outcome", format!("unknown outcome {outcome}"))),
        }
    }
    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str()) {
        if !trace_id.is_empty() && !trace_id.contains("::") {
            errors.push(err("trace_id", "expected '<campaign>::<run>::<seq>'".to_string()));
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(value).map_err(|e| vec![err("<schema>", e.to_string())])
}

/// Validate every non-empty line of a JSONL file. Returns the number of
/// valid lines and all errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), HarnessError> {
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    Ok(validate_log_text(&content))
}

#[must_use]
pub fn validate_log_text(content: &str) -> (usize, Vec<LogValidationError>) {
    let mut valid = 0;
    let mut errors = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match validate_log_line(line, i + 1) {
            Ok(_) => valid += 1,
            Err(mut errs) => errors.append(&mut errs),
        }
    }
    (valid, errors)
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(elapsed.as_secs(), elapsed.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_lines_validate() {
        let (mut emitter, buffer) = LogEmitter::to_buffer("corpus", "r1");
        let entry = emitter
            .entry(LogLevel::Info, "case_result")
            .with_scenario("join")
            .with_outcome(Outcome::Pass)
            .with_exit_code(15);
        emitter.emit_entry(&entry).unwrap();
        emitter.flush().unwrap();

        let text = buffer.contents();
        let (valid, errors) = validate_log_text(&text);
        assert_eq!(valid, 1);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(text.contains("\"trace_id\":\"corpus::r1::001\""));
        assert!(!text.contains("errno"));
    }

    #[test]
    fn missing_fields_are_reported() {
        let errs = validate_log_line(r#"{"timestamp":"t","level":"loud"}"#, 4).unwrap_err();
        let fields: Vec<_> = errs.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"trace_id"));
        assert!(fields.contains(&"event"));
        assert!(fields.contains(&"level"));
        assert!(errs.iter().all(|e| e.line_number == 4));
    }

    #[test]
    fn trace_id_needs_separator() {
        let line = r#"{"timestamp":"t","trace_id":"flat","level":"info","event":"e"}"#;
        let errs = validate_log_line(line, 1).unwrap_err();
        assert_eq!(errs[0].field, "trace_id");
    }

    #[test]
    fn unknown_outcome_rejected() {
        let line = r#"{"timestamp":"t","trace_id":"a::b::1","level":"info","event":"e","outcome":"meh"}"#;
        assert!(validate_log_line(line, 1).is_err());
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn utc_formatting() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        // 2024-02-29T12:34:56Z
        assert_eq!(format_utc(1_709_210_096, 7), "2024-02-29T12:34:56.007Z");
    }
}
