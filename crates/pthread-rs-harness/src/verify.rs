//! Output comparison and verification.

use serde::{Deserialize, Serialize};

/// Result of verifying a single fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub case_name: String,
    /// POSIX section the case exercises.
    pub posix_section: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// Diff if the case failed.
    pub diff: Option<String>,
    /// Wall-clock time spent in the case.
    pub duration_ms: u64,
}

/// Aggregate verification summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Names of failed cases, in run order.
    #[must_use]
    pub fn failures(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.case_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool) -> VerificationResult {
        VerificationResult {
            case_name: name.to_string(),
            posix_section: "POSIX pthread_join".to_string(),
            passed,
            expected: String::new(),
            actual: String::new(),
            diff: None,
            duration_ms: 0,
        }
    }

    #[test]
    fn summary_counts() {
        let s = VerificationSummary::from_results(vec![
            result("a", true),
            result("b", false),
            result("c", true),
        ]);
        assert_eq!((s.total, s.passed, s.failed), (3, 2, 1));
        assert!(!s.all_passed());
        assert_eq!(s.failures(), vec!["b"]);
    }

    #[test]
    fn empty_summary_passes() {
        assert!(VerificationSummary::from_results(Vec::new()).all_passed());
    }
}
