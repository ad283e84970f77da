//! machine.rs
//!
//! Bounded generate -> verify -> debug repair loop.

use crate::diagnose;
use crate::harness::{Verification, Verifier};
use crate::logger::{banner, log, LogLevel};
use crate::services::{CodeGenerator, DebugAnalyst, DebugContext, TestCaseGenerator};
use crate::state::{AttemptRecord, FinalResult, Phase, RunConfig, TestCase, TestStatus};

pub struct RepairLoop {
    config: RunConfig,
    testgen: Box<dyn TestCaseGenerator>,
    codegen: Box<dyn CodeGenerator>,
    debugger: Box<dyn DebugAnalyst>,
    verifier: Box<dyn Verifier>,
}

struct RunState {
    phase: Phase,
    attempt: usize,
    test_cases: Vec<TestCase>,
    candidate: Option<String>,
    last: Option<Verification>,
    history: Vec<AttemptRecord>,
    /// At most one feedback string is live: the debugger replaces it,
    /// the next generation consumes it.
    feedback: Option<String>,
}

impl RepairLoop {
    pub fn new(
        config: RunConfig,
        testgen: Box<dyn TestCaseGenerator>,
        codegen: Box<dyn CodeGenerator>,
        debugger: Box<dyn DebugAnalyst>,
        verifier: Box<dyn Verifier>,
    ) -> Self {
        Self {
            config,
            testgen,
            codegen,
            debugger,
            verifier,
        }
    }

    /// Drive one full run to its terminal result.
    pub fn run(&self, problem: &str) -> FinalResult {
        let mut state = RunState {
            phase: Phase::Init,
            attempt: 0,
            test_cases: Vec::new(),
            candidate: None,
            last: None,
            history: Vec::new(),
            feedback: None,
        };

        loop {
            match state.phase {
                Phase::Init => self.init(problem, &mut state),
                Phase::Generating => self.generate(problem, &mut state),
                Phase::Verifying => self.verify(&mut state),
                Phase::Debugging => self.debug(problem, &mut state),
                Phase::Succeeded => return self.succeeded(state),
                Phase::Failed => return self.failed(state),
            }
        }
    }

    fn init(&self, problem: &str, state: &mut RunState) {
        banner("generating test cases");
        let cases = self.testgen.generate(problem, self.config.num_tests);
        if cases.is_empty() {
            log(LogLevel::Error, "no test cases generated, aborting run");
            transition(state, Phase::Failed);
            return;
        }
        state.test_cases = cases;
        transition(state, Phase::Generating);
    }

    fn generate(&self, problem: &str, state: &mut RunState) {
        state.attempt += 1;
        banner(&format!(
            "attempt {}/{}",
            state.attempt, self.config.max_attempts
        ));
        let candidate = self.codegen.generate(problem, state.feedback.as_deref());
        state.candidate = Some(candidate);
        transition(state, Phase::Verifying);
    }

    fn verify(&self, state: &mut RunState) {
        let candidate = state.candidate.clone().unwrap_or_default();
        let verification = self.verifier.verify(&candidate, &state.test_cases);

        state.history.push(AttemptRecord {
            attempt: state.attempt,
            candidate,
            outcomes: verification.outcomes.clone(),
            all_passed: verification.all_passed,
            error_summary: (!verification.all_passed).then(|| verification.summary.clone()),
        });

        let passed = verification.all_passed;
        state.last = Some(verification);

        if passed {
            transition(state, Phase::Succeeded);
        } else if state.attempt < self.config.max_attempts {
            transition(state, Phase::Debugging);
        } else {
            transition(state, Phase::Failed);
        }
    }

    fn debug(&self, problem: &str, state: &mut RunState) {
        let Some(last) = state.last.as_ref() else {
            transition(state, Phase::Generating);
            return;
        };

        let failures: Vec<_> = last
            .outcomes
            .iter()
            .filter(|o| o.status != TestStatus::Pass)
            .cloned()
            .collect();

        let ctx = DebugContext {
            candidate: state.candidate.clone().unwrap_or_default(),
            problem: problem.to_string(),
            failures,
            error_summary: last.summary.clone(),
            attempt: state.attempt,
            prior_feedback: state.feedback.take(),
        };

        state.feedback = Some(self.debugger.analyze(&ctx));
        transition(state, Phase::Generating);
    }

    fn succeeded(&self, state: RunState) -> FinalResult {
        banner(&format!("success in {} attempt(s)", state.attempt));
        let outcomes = state.last.map(|v| v.outcomes).unwrap_or_default();
        FinalResult {
            success: true,
            candidate: state.candidate,
            attempts: state.attempt,
            max_attempts: self.config.max_attempts,
            message: format!("All {} tests passed", state.test_cases.len()),
            test_cases: state.test_cases,
            outcomes,
            history: state.history,
            report: None,
        }
    }

    fn failed(&self, state: RunState) -> FinalResult {
        // aborted before any attempt: zero attempts, no history, no report
        if state.attempt == 0 {
            return FinalResult {
                success: false,
                candidate: None,
                attempts: 0,
                max_attempts: self.config.max_attempts,
                message: "Failed to generate test cases".to_string(),
                test_cases: Vec::new(),
                outcomes: Vec::new(),
                history: Vec::new(),
                report: None,
            };
        }

        banner(&format!("failed after {} attempt(s)", state.attempt));
        let (outcomes, summary) = state
            .last
            .map(|v| (v.outcomes, v.summary))
            .unwrap_or_default();

        let mut result = FinalResult {
            success: false,
            candidate: state.candidate,
            attempts: state.attempt,
            max_attempts: self.config.max_attempts,
            message: format!("Failed after {} attempts: {summary}", state.attempt),
            test_cases: state.test_cases,
            outcomes,
            history: state.history,
            report: None,
        };
        result.report = Some(diagnose::build_report(&result));
        result
    }
}

fn transition(state: &mut RunState, next: Phase) {
    state.phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TestInput, TestOutcome};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    fn cases(n: usize) -> Vec<TestCase> {
        (0..n)
            .map(|i| TestCase {
                description: format!("case {i}"),
                input: TestInput::Scalar(json!(i)),
                expected: json!(i),
                category: Default::default(),
            })
            .collect()
    }

    struct StubTestGen {
        cases: Vec<TestCase>,
        calls: Rc<Cell<usize>>,
    }
    impl TestCaseGenerator for StubTestGen {
        fn generate(&self, _problem: &str, _count: usize) -> Vec<TestCase> {
            self.calls.set(self.calls.get() + 1);
            self.cases.clone()
        }
    }

    struct StubCodeGen {
        calls: Rc<Cell<usize>>,
        feedback_seen: Rc<RefCell<Vec<Option<String>>>>,
    }
    impl CodeGenerator for StubCodeGen {
        fn generate(&self, _problem: &str, feedback: Option<&str>) -> String {
            self.calls.set(self.calls.get() + 1);
            self.feedback_seen
                .borrow_mut()
                .push(feedback.map(str::to_string));
            format!("def solve(x):\n    return x  # rev {}\n", self.calls.get())
        }
    }

    struct StubDebugger {
        calls: Rc<Cell<usize>>,
        prior_seen: Rc<RefCell<Vec<Option<String>>>>,
    }
    impl DebugAnalyst for StubDebugger {
        fn analyze(&self, ctx: &DebugContext) -> String {
            self.calls.set(self.calls.get() + 1);
            self.prior_seen
                .borrow_mut()
                .push(ctx.prior_feedback.clone());
            format!("feedback {}", self.calls.get())
        }
    }

    /// Passes verification only on the configured call number.
    struct StubVerifier {
        pass_on: Option<usize>,
        calls: Rc<Cell<usize>>,
    }
    impl Verifier for StubVerifier {
        fn verify(&self, _source: &str, cases: &[TestCase]) -> Verification {
            self.calls.set(self.calls.get() + 1);
            let pass = self.pass_on == Some(self.calls.get());
            let outcomes: Vec<TestOutcome> = cases
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if pass {
                        TestOutcome::pass(i + 1, c, c.expected.clone())
                    } else {
                        TestOutcome::fail(i + 1, c, json!(null))
                    }
                })
                .collect();
            let summary = if pass {
                format!("All {} tests passed", outcomes.len())
            } else {
                format!("{}/{} tests failed", outcomes.len(), outcomes.len())
            };
            Verification {
                all_passed: pass,
                outcomes,
                summary,
            }
        }
    }

    struct Counters {
        testgen: Rc<Cell<usize>>,
        codegen: Rc<Cell<usize>>,
        debug: Rc<Cell<usize>>,
        verify: Rc<Cell<usize>>,
        feedback_seen: Rc<RefCell<Vec<Option<String>>>>,
        prior_seen: Rc<RefCell<Vec<Option<String>>>>,
    }

    fn build(max_attempts: usize, suite: Vec<TestCase>, pass_on: Option<usize>) -> (RepairLoop, Counters) {
        let counters = Counters {
            testgen: Rc::new(Cell::new(0)),
            codegen: Rc::new(Cell::new(0)),
            debug: Rc::new(Cell::new(0)),
            verify: Rc::new(Cell::new(0)),
            feedback_seen: Rc::new(RefCell::new(Vec::new())),
            prior_seen: Rc::new(RefCell::new(Vec::new())),
        };
        let repair = RepairLoop::new(
            RunConfig::new(max_attempts, suite.len(), Duration::from_secs(1)),
            Box::new(StubTestGen {
                cases: suite,
                calls: counters.testgen.clone(),
            }),
            Box::new(StubCodeGen {
                calls: counters.codegen.clone(),
                feedback_seen: counters.feedback_seen.clone(),
            }),
            Box::new(StubDebugger {
                calls: counters.debug.clone(),
                prior_seen: counters.prior_seen.clone(),
            }),
            Box::new(StubVerifier {
                pass_on,
                calls: counters.verify.clone(),
            }),
        );
        (repair, counters)
    }

    #[test]
    fn first_attempt_success_stops_immediately() {
        let (repair, counters) = build(5, cases(4), Some(1));
        let result = repair.run("sum a list");

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.history.len(), 1);
        assert!(result.history[0].all_passed);
        assert!(result.history[0].error_summary.is_none());
        assert!(result.report.is_none());
        assert_eq!(counters.codegen.get(), 1);
        assert_eq!(counters.debug.get(), 0);
    }

    #[test]
    fn exhausting_the_budget_yields_a_report() {
        let (repair, counters) = build(3, cases(2), None);
        let result = repair.run("sum a list");

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.history.len(), 3);
        assert_eq!(counters.codegen.get(), 3);
        assert_eq!(counters.verify.get(), 3);
        // the last attempt gets no debug cycle
        assert_eq!(counters.debug.get(), 2);

        let report = result.report.expect("failure report");
        assert!(report.contains("Attempts Made: 3/3"));

        // attempt indices are 1..N with no gaps
        let indices: Vec<usize> = result.history.iter().map(|a| a.attempt).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn empty_test_suite_aborts_before_any_attempt() {
        let (repair, counters) = build(3, Vec::new(), Some(1));
        let result = repair.run("sum a list");

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert!(result.history.is_empty());
        assert!(result.report.is_none());
        assert_eq!(counters.testgen.get(), 1);
        assert_eq!(counters.codegen.get(), 0);
        assert_eq!(counters.debug.get(), 0);
        assert_eq!(counters.verify.get(), 0);
    }

    #[test]
    fn success_mid_run_consumes_only_needed_attempts() {
        let (repair, counters) = build(5, cases(1), Some(3));
        let result = repair.run("sum a list");

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.history.len(), 3);
        assert_eq!(counters.debug.get(), 2);
        assert!(result.history[2].all_passed);
        assert!(!result.history[1].all_passed);
    }

    #[test]
    fn feedback_threads_forward_one_slot_at_a_time() {
        let (repair, counters) = build(3, cases(1), None);
        repair.run("sum a list");

        // generation: none, then feedback 1, then feedback 2
        assert_eq!(
            *counters.feedback_seen.borrow(),
            vec![
                None,
                Some("feedback 1".to_string()),
                Some("feedback 2".to_string())
            ]
        );
        // debugger sees the prior round's feedback, not its own
        assert_eq!(
            *counters.prior_seen.borrow(),
            vec![None, Some("feedback 1".to_string())]
        );
    }
}
