//! Fixture loading and management.

use std::path::Path;

use pthread_rs_core::UnsupportedOp;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::scenarios::render_outcome;

/// A single test fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case name, unique within its set.
    pub name: String,
    /// Scenario the case runs.
    pub scenario: String,
    /// POSIX section the case exercises.
    pub posix_section: String,
    /// Expected console output.
    pub expected_output: String,
    /// Expected exit code of the program.
    #[serde(default)]
    pub expected_exit: i32,
}

impl FixtureCase {
    /// Expected text in the form produced by [`render_outcome`].
    #[must_use]
    pub fn expected(&self) -> String {
        render_outcome(&self.expected_output, self.expected_exit)
    }
}

/// A collection of fixture cases for a family of functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Fixture format version.
    pub version: String,
    /// Function family (e.g., "pthread").
    pub family: String,
    /// Capture source.
    pub captured_at: String,
    pub cases: Vec<FixtureCase>,
}

impl FixtureSet {
    pub fn from_json(json: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_json(&content)
    }

    /// Keep only cases whose name contains `pattern`.
    #[must_use]
    pub fn filtered(mut self, pattern: &str) -> Self {
        self.cases.retain(|c| c.name.contains(pattern));
        self
    }

    /// Expected behavior of every built-in scenario.
    #[must_use]
    pub fn builtin() -> Self {
        let mut cases = vec![
            case(
                "args_retval_intvalue",
                "POSIX pthread_create/pthread_exit",
                "thread1 returns sum 11325\nthread2 returns sum 31375\n42700\n",
                0,
            ),
            case(
                "args_retval_pointer",
                "POSIX pthread_join value_ptr",
                concat!(
                    "Calculator (1,  1) ==> +:  2;   -:  0;   *:  1;   /:  1;   %:  0\n",
                    "Calculator (2,  4) ==> +:  6;   -: -2;   *:  8;   /:  0;   %:  2\n",
                    "Calculator (3,  9) ==> +: 12;   -: -6;   *: 27;   /:  0;   %:  3\n",
                    "Calculator (4, 16) ==> +: 20;   -:-12;   *: 64;   /:  0;   %:  4\n",
                    "Calculator (5, 25) ==> +: 30;   -:-20;   *:125;   /:  0;   %:  5\n",
                ),
                0,
            ),
            case(
                "mutex_shared_val_auto",
                "POSIX pthread_mutex_lock",
                &shared_val_output(100),
                100,
            ),
            case("join", "POSIX pthread_join", "now value is 15\n", 15),
            case(
                "cond_wait_incval",
                "POSIX pthread_cond_wait",
                &cond_wait_output(),
                0,
            ),
            case(
                "destr_test",
                "POSIX pthread_key_create",
                "thread sets 15 and gets: 15\n\ndestructor invoked with param 15\n\n",
                0,
            ),
            case(
                "join_in_thread_int",
                "POSIX pthread_join",
                concat!(
                    "thread with retval 0 finished\n",
                    "thread with retval 1 finished\n",
                    "thread with retval 2 finished\n",
                    "thread with retval 3 finished\n",
                    "now value is 4\n",
                ),
                4,
            ),
            case(
                "mutex_default_unlock_notowner",
                "POSIX pthread_mutex_unlock",
                "result of unlock: 0\n",
                0,
            ),
            case(
                "mutex_errorcheck_unlock_notowner",
                "POSIX pthread_mutex_unlock",
                "result of unlock: 1\n",
                0,
            ),
            case(
                "mutex_errorcheck_unlock_notlocked",
                "POSIX pthread_mutex_unlock",
                "pthread_mutex_unlock() gives return code: 1\n",
                0,
            ),
            case(
                "detach_join_conflicts",
                "POSIX pthread_detach",
                concat!(
                    "join after detach: 22\n",
                    "joined value: 7\n",
                    "detach after join: 22\n",
                    "second join: 22\n",
                ),
                0,
            ),
            case(
                "self_join",
                "POSIX pthread_join",
                "self join: 35\nself equal: 1\n",
                0,
            ),
            case(
                "recursive_relock",
                "POSIX pthread_mutexattr_settype",
                concat!(
                    "recursive trylock while held: 0\n",
                    "extra unlock: 1\n",
                    "errorcheck relock: 35\n",
                    "destroy while locked: 16\n",
                ),
                0,
            ),
            case("once_init", "POSIX pthread_once", "init ran 1 time(s)\n", 0),
        ];
        let ops = UnsupportedOp::ALL.len();
        cases.push(case(
            "unsupported_gate",
            "ENOTSUP gate",
            &format!("{ops} of {ops} operations rejected with ENOTSUP\nstate unchanged: true\n"),
            0,
        ));

        Self {
            version: "1".to_string(),
            family: "pthread".to_string(),
            captured_at: "builtin".to_string(),
            cases,
        }
    }
}

fn case(scenario: &str, section: &str, output: &str, exit: i32) -> FixtureCase {
    FixtureCase {
        name: scenario.to_string(),
        scenario: scenario.to_string(),
        posix_section: section.to_string(),
        expected_output: output.to_string(),
        expected_exit: exit,
    }
}

fn shared_val_output(threads: i32) -> String {
    let mut out = String::new();
    for v in 1..=threads {
        out.push_str("thread got the mutex\n");
        out.push_str(&format!("thread increased the value, value is now: {v}\n"));
    }
    out.push_str(&format!("shared var is now: {threads}\n"));
    out
}

fn cond_wait_output() -> String {
    let mut out = String::new();
    for v in 1..=10 {
        let who = if (4..=7).contains(&v) { 2 } else { 1 };
        out.push_str(&format!("Cur counter value functionCount{who}: {v}\n"));
    }
    out.push_str("Final count is: 10\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios;

    #[test]
    fn every_builtin_case_has_a_scenario() {
        for c in FixtureSet::builtin().cases {
            assert!(scenarios::lookup(&c.scenario).is_some(), "{}", c.scenario);
        }
    }

    #[test]
    fn json_round_trip_keeps_cases() {
        let set = FixtureSet::builtin();
        let back = FixtureSet::from_json(&set.to_json()).unwrap();
        assert_eq!(back.cases.len(), set.cases.len());
        assert_eq!(back.cases[3].expected_exit, 15);
    }

    #[test]
    fn missing_exit_defaults_to_zero() {
        let json = r#"{"version":"1","family":"pthread","captured_at":"hand","cases":[
            {"name":"j","scenario":"join","posix_section":"x","expected_output":"a\n"}]}"#;
        let set = FixtureSet::from_json(json).unwrap();
        assert_eq!(set.cases[0].expected(), "a\n[exit 0]\n");
    }

    #[test]
    fn filter_by_name() {
        let set = FixtureSet::builtin().filtered("mutex_errorcheck");
        assert_eq!(set.cases.len(), 2);
    }

    #[test]
    fn cond_output_interleaves_counters() {
        let text = cond_wait_output();
        assert!(text.starts_with("Cur counter value functionCount1: 1\n"));
        assert!(text.contains("functionCount2: 4\n"));
        assert!(text.contains("functionCount1: 8\n"));
    }
}
