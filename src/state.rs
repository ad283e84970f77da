//! state.rs
//!
//! Data model shared across the verification and repair loop.

use std::fmt;
use std::time::Duration;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* ---------- run lifecycle ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    Generating,
    Verifying,
    Debugging,
    Succeeded,
    Failed,
}

/// Loop configuration. `max_attempts` is clamped to at least one.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_attempts: usize,
    pub num_tests: usize,
    pub case_timeout: Duration,
}

impl RunConfig {
    pub fn new(max_attempts: usize, num_tests: usize, case_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            num_tests,
            case_timeout,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            num_tests: 8,
            case_timeout: Duration::from_secs(10),
        }
    }
}

/* ---------- test cases ---------- */

/// Input handed to the candidate's entry function.
///
/// A bare JSON array is a `Sequence`; whether it is unpacked into
/// positional arguments is decided by the argument binder against the
/// entry function's arity. `Pair` is the explicit two-argument form
/// (`{"pair": [a, b]}` on the wire) and always unpacks.
#[derive(Debug, Clone, PartialEq)]
pub enum TestInput {
    Scalar(Value),
    Sequence(Vec<Value>),
    Pair(Value, Value),
}

impl TestInput {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => TestInput::Sequence(items),
            Value::Object(mut map) if map.len() == 1 && map.contains_key("pair") => {
                match map.remove("pair") {
                    Some(Value::Array(items)) => match <[Value; 2]>::try_from(items) {
                        Ok([a, b]) => TestInput::Pair(a, b),
                        Err(items) => TestInput::Sequence(items),
                    },
                    Some(other) => TestInput::Scalar(other),
                    None => TestInput::Scalar(Value::Null),
                }
            }
            other => TestInput::Scalar(other),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TestInput::Scalar(v) => v.clone(),
            TestInput::Sequence(items) => Value::Array(items.clone()),
            TestInput::Pair(a, b) => {
                serde_json::json!({ "pair": [a, b] })
            }
        }
    }
}

impl fmt::Display for TestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for TestInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TestInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(TestInput::from_value(Value::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    HappyPath,
    EdgeCase,
    Boundary,
    Invalid,
    Special,
    #[serde(other)]
    General,
}

impl Default for TestCategory {
    fn default() -> Self {
        TestCategory::General
    }
}

impl TestCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TestCategory::HappyPath => "happy_path",
            TestCategory::EdgeCase => "edge_case",
            TestCategory::Boundary => "boundary",
            TestCategory::Invalid => "invalid",
            TestCategory::Special => "special",
            TestCategory::General => "general",
        }
    }
}

/// One generated test case. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default = "default_description")]
    pub description: String,
    pub input: TestInput,
    pub expected: Value,
    #[serde(default)]
    pub category: TestCategory,
}

fn default_description() -> String {
    "Test case".to_string()
}

/* ---------- outcomes ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "ERROR")]
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Error => "ERROR",
        }
    }
}

/// Classification of a single test case within one attempt.
/// Exactly one of `actual` / `error` is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_num: usize,
    pub description: String,
    pub input: TestInput,
    pub expected: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: TestStatus,
}

impl TestOutcome {
    pub fn pass(test_num: usize, case: &TestCase, actual: Value) -> Self {
        Self {
            test_num,
            description: case.description.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual: Some(actual),
            error: None,
            status: TestStatus::Pass,
        }
    }

    pub fn fail(test_num: usize, case: &TestCase, actual: Value) -> Self {
        Self {
            test_num,
            description: case.description.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual: Some(actual),
            error: None,
            status: TestStatus::Fail,
        }
    }

    pub fn error(test_num: usize, case: &TestCase, message: String) -> Self {
        Self {
            test_num,
            description: case.description.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual: None,
            error: Some(message),
            status: TestStatus::Error,
        }
    }

    /// What the candidate produced, for reports and debug prompts.
    pub fn observed(&self) -> String {
        match (&self.actual, &self.error) {
            (Some(v), _) => v.to_string(),
            (None, Some(e)) => format!("ERROR: {e}"),
            (None, None) => "ERROR".to_string(),
        }
    }
}

/* ---------- history ---------- */

/// One generate → verify cycle. Appended to history, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: usize,
    pub candidate: String,
    pub outcomes: Vec<TestOutcome>,
    pub all_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
}

/// Terminal artifact of a run. Serializable in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    pub attempts: usize,
    pub max_attempts: usize,
    pub message: String,
    pub test_cases: Vec<TestCase>,
    pub outcomes: Vec<TestOutcome>,
    pub history: Vec<AttemptRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_roundtrips_through_json() {
        let scalar: TestInput = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(scalar, TestInput::Scalar(json!(42)));

        let seq: TestInput = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(seq, TestInput::Sequence(vec![json!(1), json!(2), json!(3)]));

        let pair: TestInput =
            serde_json::from_value(json!({ "pair": [[2, 7, 11, 15], 9] })).unwrap();
        assert_eq!(pair, TestInput::Pair(json!([2, 7, 11, 15]), json!(9)));

        for input in [
            TestInput::Scalar(json!("racecar")),
            TestInput::Sequence(vec![json!(1), json!(null)]),
            TestInput::Pair(json!([1]), json!(2)),
        ] {
            let wire = serde_json::to_value(&input).unwrap();
            assert_eq!(TestInput::from_value(wire), input);
        }
    }

    #[test]
    fn malformed_pair_wrapper_degrades_to_sequence() {
        let odd: TestInput = serde_json::from_value(json!({ "pair": [1, 2, 3] })).unwrap();
        assert_eq!(
            odd,
            TestInput::Sequence(vec![json!(1), json!(2), json!(3)])
        );
    }

    #[test]
    fn unknown_category_becomes_general() {
        let case: TestCase = serde_json::from_value(json!({
            "description": "stress",
            "input": [1, 2],
            "expected": 3,
            "category": "performance"
        }))
        .unwrap();
        assert_eq!(case.category, TestCategory::General);
    }

    #[test]
    fn missing_category_and_description_default() {
        let case: TestCase =
            serde_json::from_value(json!({ "input": 1, "expected": 1 })).unwrap();
        assert_eq!(case.category, TestCategory::General);
        assert_eq!(case.description, "Test case");
    }

    #[test]
    fn final_result_serializes_in_full() {
        let case = TestCase {
            description: "sum".into(),
            input: TestInput::Sequence(vec![json!(1), json!(2)]),
            expected: json!(3),
            category: TestCategory::HappyPath,
        };
        let outcome = TestOutcome::pass(1, &case, json!(3));
        let result = FinalResult {
            success: true,
            candidate: Some("def add(xs):\n    return sum(xs)\n".into()),
            attempts: 1,
            max_attempts: 8,
            message: "All 1 tests passed".into(),
            test_cases: vec![case],
            outcomes: vec![outcome.clone()],
            history: vec![AttemptRecord {
                attempt: 1,
                candidate: "def add(xs):\n    return sum(xs)\n".into(),
                outcomes: vec![outcome],
                all_passed: true,
                error_summary: None,
            }],
            report: None,
        };

        let wire = serde_json::to_string(&result).unwrap();
        let back: FinalResult = serde_json::from_str(&wire).unwrap();
        assert!(back.success);
        assert_eq!(back.attempts, 1);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.outcomes[0].status, TestStatus::Pass);
    }

    #[test]
    fn run_config_clamps_attempt_budget() {
        let cfg = RunConfig::new(0, 5, Duration::from_secs(1));
        assert_eq!(cfg.max_attempts, 1);
    }
}
