//! External collaborators consumed by the repair loop. Each is an
//! opaque request/response contract; the loop never cares whether a
//! reply came from a remote model or a local fallback.

pub mod codegen;
pub mod debugger;
pub mod testgen;

use crate::state::{TestCase, TestOutcome};

pub trait CodeGenerator {
    /// Produce candidate source for the problem, incorporating debugger
    /// feedback from the previous attempt when present. Never fails:
    /// transport errors yield a placeholder candidate.
    fn generate(&self, problem: &str, feedback: Option<&str>) -> String;
}

pub trait TestCaseGenerator {
    /// Produce up to `count` test cases. An empty result aborts the run
    /// before any attempt is consumed.
    fn generate(&self, problem: &str, count: usize) -> Vec<TestCase>;
}

/// Everything the debug analyst sees about a failed attempt.
#[derive(Debug, Clone)]
pub struct DebugContext {
    pub candidate: String,
    pub problem: String,
    pub failures: Vec<TestOutcome>,
    pub error_summary: String,
    pub attempt: usize,
    pub prior_feedback: Option<String>,
}

pub trait DebugAnalyst {
    /// Turn a failed attempt into feedback text for the next generation.
    fn analyze(&self, ctx: &DebugContext) -> String;
}
