//! Report generation for conformance results.

use serde::{Deserialize, Serialize};

use crate::gate_probe::GateProbeReport;
use crate::verify::VerificationSummary;

/// A conformance report combining scenario verification and the gate probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub title: String,
    /// Campaign name the run was started under.
    pub campaign: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub summary: VerificationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_probe: Option<GateProbeReport>,
}

impl ConformanceReport {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Campaign: {}\n", self.campaign));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Case | Section | Status | ms |\n");
        out.push_str("|------|---------|--------|----|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                r.case_name, r.posix_section, status, r.duration_ms
            ));
        }

        for r in self.summary.results.iter().filter(|r| !r.passed) {
            if let Some(diff) = &r.diff {
                out.push_str(&format!("\n## {}\n\n```diff\n{}```\n", r.case_name, diff));
            }
        }

        if let Some(probe) = &self.gate_probe {
            out.push_str("\n## Unsupported gate\n\n");
            out.push_str(&format!(
                "- Operations probed: {}\n- Rejected with ENOTSUP: {}\n- State unchanged: {}\n",
                probe.probes.len(),
                probe.rejected(),
                probe.state_unchanged
            ));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
