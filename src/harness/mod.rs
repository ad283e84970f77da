//! Test harness: load an untrusted candidate, locate its entry
//! function, run every test case through the argument binder, and
//! classify each outcome.

pub mod binder;
pub mod matcher;
pub mod sandbox;
pub mod scan;

use std::time::Duration;

use serde_json::Value;

use crate::logger::{log, LogLevel};
use crate::state::{TestCase, TestOutcome, TestStatus};

use binder::bind;
use matcher::values_match;
use sandbox::Sandbox;
use scan::scan_entry_functions;

/// Result of verifying one candidate against the fixed test-case set.
#[derive(Debug, Clone)]
pub struct Verification {
    pub all_passed: bool,
    pub outcomes: Vec<TestOutcome>,
    pub summary: String,
}

/// Seam between the repair loop and candidate execution.
pub trait Verifier {
    fn verify(&self, source: &str, cases: &[TestCase]) -> Verification;
}

pub struct TestHarness {
    case_timeout: Duration,
}

impl TestHarness {
    pub fn new(case_timeout: Duration) -> Self {
        Self { case_timeout }
    }
}

impl Verifier for TestHarness {
    fn verify(&self, source: &str, cases: &[TestCase]) -> Verification {
        // One sandbox per attempt; each check/call below is its own process.
        let sandbox = match Sandbox::create(source, self.case_timeout) {
            Ok(s) => s,
            Err(e) => return short_circuit(cases, &format!("Execution Error: {e}")),
        };

        match sandbox.check() {
            Ok(reply) if reply.ok => {
                log(LogLevel::Info, "candidate compiled and loaded");
            }
            Ok(reply) => {
                let detail = reply.error.unwrap_or_default();
                let msg = match reply.stage.as_deref() {
                    Some("syntax") => format!("Syntax Error: {detail}"),
                    _ => format!("Execution Error: {detail}"),
                };
                log(LogLevel::Error, &msg);
                return short_circuit(cases, &msg);
            }
            Err(e) => {
                let msg = format!("Execution Error: {e}");
                log(LogLevel::Error, &msg);
                return short_circuit(cases, &msg);
            }
        }

        let entries = scan_entry_functions(source);
        let entry = match entries.first() {
            Some(e) => e.clone(),
            None => {
                let msg = "No entry function found in candidate".to_string();
                log(LogLevel::Error, &msg);
                return short_circuit(cases, &msg);
            }
        };
        if entries.len() > 1 {
            log(
                LogLevel::Warn,
                format!(
                    "{} public functions declared, using first: {}",
                    entries.len(),
                    entry.name
                ),
            );
        }
        log(
            LogLevel::Info,
            format!("entry function {}/{}", entry.name, entry.param_count),
        );

        let mut outcomes = Vec::with_capacity(cases.len());
        let mut all_passed = true;

        for (i, case) in cases.iter().enumerate() {
            let test_num = i + 1;
            let plan = bind(entry.param_count, &case.input);

            let outcome = match sandbox.call(&entry.name, &plan) {
                Ok(reply) if reply.ok => {
                    let actual = reply.result.unwrap_or(Value::Null);
                    if values_match(&actual, &case.expected) {
                        TestOutcome::pass(test_num, case, actual)
                    } else {
                        TestOutcome::fail(test_num, case, actual)
                    }
                }
                Ok(reply) => TestOutcome::error(
                    test_num,
                    case,
                    reply
                        .error
                        .unwrap_or_else(|| "candidate raised an exception".to_string()),
                ),
                Err(e) => TestOutcome::error(test_num, case, e),
            };

            match outcome.status {
                TestStatus::Pass => log(LogLevel::Success, format!("test {test_num}: PASS")),
                TestStatus::Fail => log(
                    LogLevel::Error,
                    format!(
                        "test {test_num}: FAIL (input {}, expected {}, got {})",
                        case.input,
                        case.expected,
                        outcome.observed()
                    ),
                ),
                TestStatus::Error => log(
                    LogLevel::Error,
                    format!(
                        "test {test_num}: ERROR ({})",
                        outcome.error.as_deref().unwrap_or("")
                    ),
                ),
            }

            if outcome.status != TestStatus::Pass {
                all_passed = false;
            }
            outcomes.push(outcome);
        }

        let summary = if all_passed {
            format!("All {} tests passed", outcomes.len())
        } else {
            let failed = outcomes
                .iter()
                .filter(|o| o.status != TestStatus::Pass)
                .count();
            format!("{failed}/{} tests failed", outcomes.len())
        };

        Verification {
            all_passed,
            outcomes,
            summary,
        }
    }
}

/// Harness-level failure: every test case gets the same classification
/// and no per-test execution is attempted.
fn short_circuit(cases: &[TestCase], message: &str) -> Verification {
    let outcomes = cases
        .iter()
        .enumerate()
        .map(|(i, case)| TestOutcome::error(i + 1, case, message.to_string()))
        .collect();
    Verification {
        all_passed: false,
        outcomes,
        summary: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TestInput;
    use serde_json::json;

    #[test]
    fn short_circuit_marks_every_case_with_the_same_error() {
        let cases: Vec<TestCase> = (0..3)
            .map(|i| TestCase {
                description: format!("case {i}"),
                input: TestInput::Scalar(json!(i)),
                expected: json!(i),
                category: Default::default(),
            })
            .collect();

        let v = short_circuit(&cases, "Syntax Error: bad indent");
        assert!(!v.all_passed);
        assert_eq!(v.outcomes.len(), 3);
        for (i, o) in v.outcomes.iter().enumerate() {
            assert_eq!(o.test_num, i + 1);
            assert_eq!(o.status, TestStatus::Error);
            assert_eq!(o.error.as_deref(), Some("Syntax Error: bad indent"));
            assert!(o.actual.is_none());
        }
        assert_eq!(v.summary, "Syntax Error: bad indent");
    }
}
