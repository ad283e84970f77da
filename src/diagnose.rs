//! Static failure diagnostics: import scanning, missing-dependency
//! detection, and the final report built when a run exhausts its
//! attempt budget.

use std::collections::BTreeSet;
use std::process::{Command, Stdio};

use regex::Regex;

use crate::harness::sandbox::resolve_interpreter;
use crate::state::{FinalResult, TestOutcome, TestStatus};

const CANDIDATE_PREVIEW_LIMIT: usize = 1500;

/// Root modules referenced by import declarations, in first-seen order.
pub fn scan_imports(source: &str) -> Vec<String> {
    let plain = Regex::new(r"(?m)^[ \t]*import[ \t]+([A-Za-z_][\w\.]*(?:[ \t]*,[ \t]*[A-Za-z_][\w\.]*)*)")
        .expect("import regex");
    let from = Regex::new(r"(?m)^[ \t]*from[ \t]+([A-Za-z_][\w\.]*)[ \t]+import")
        .expect("from-import regex");

    let mut out: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let root = name.split('.').next().unwrap_or(name).trim().to_string();
        if !root.is_empty() && !out.contains(&root) {
            out.push(root);
        }
    };

    for caps in plain.captures_iter(source) {
        for name in caps[1].split(',') {
            push(name);
        }
    }
    for caps in from.captures_iter(source) {
        push(&caps[1]);
    }
    out
}

/// Probe the interpreter's installed-module registry.
/// None when no interpreter is available to ask.
pub fn module_available(name: &str) -> Option<bool> {
    let python = resolve_interpreter()?;
    let status = Command::new(python)
        .arg("-c")
        .arg("import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()?;
    Some(status.success())
}

/// Names that look missing: undefined-name and module-not-found
/// patterns in the run-level error and in each errored outcome, unioned
/// with imports the interpreter cannot resolve. Sorted for stable
/// reports.
pub fn extract_missing(error: &str, outcomes: &[TestOutcome], source: &str) -> Vec<String> {
    let patterns = [
        r"name '([A-Za-z_]\w*)' is not defined",
        r"No module named '([A-Za-z_][\w\.]*)'",
        r"cannot import name '([A-Za-z_]\w*)'",
    ];

    let mut missing = BTreeSet::new();

    for pattern in patterns {
        let re = Regex::new(pattern).expect("error pattern");
        for caps in re.captures_iter(error) {
            missing.insert(root_of(&caps[1]));
        }
        for outcome in outcomes.iter().filter(|o| o.status == TestStatus::Error) {
            if let Some(err) = &outcome.error {
                for caps in re.captures_iter(err) {
                    missing.insert(root_of(&caps[1]));
                }
            }
        }
    }

    for module in scan_imports(source) {
        if module_available(&module) == Some(false) {
            missing.insert(module);
        }
    }

    missing.into_iter().collect()
}

fn root_of(name: &str) -> String {
    name.split('.').next().unwrap_or(name).to_string()
}

/* ---------- report ---------- */

/// Fixed-structure failure report for the user. Formatting only; the
/// run is already over when this is built.
pub fn build_report(result: &FinalResult) -> String {
    let rule = "=".repeat(70);
    let mut report = String::new();

    let error = result
        .history
        .last()
        .and_then(|a| a.error_summary.clone())
        .unwrap_or_else(|| result.message.clone());

    report.push_str(&format!("\n{rule}\nDEBUGGING REPORT\n{rule}\n"));
    report.push_str(&format!(
        "\nAttempts Made: {}/{}\nFinal Status: FAILED\nError: {error}\n",
        result.attempts, result.max_attempts
    ));

    let candidate = result.candidate.as_deref().unwrap_or("");
    let missing = extract_missing(&error, &result.outcomes, candidate);

    if !missing.is_empty() {
        report.push_str(&format!("\n{rule}\nISSUE DETECTED: missing modules\n{rule}\n"));
        report.push_str("The generated code needs modules that may not be installed:\n");
        for module in &missing {
            report.push_str(&format!("\nModule: {module}\n"));
            match module_available(module) {
                Some(true) => report.push_str("   module is installed\n"),
                Some(false) => {
                    report.push_str("   module is NOT installed\n");
                    report.push_str(&format!("   Fix: pip install {module}\n"));
                }
                None => report.push_str("   could not check availability\n"),
            }
        }
    }

    report.push_str(&format!("\n{rule}\nTEST RESULTS SUMMARY\n{rule}\n"));
    let total = result.outcomes.len();
    let count = |status: TestStatus| {
        result
            .outcomes
            .iter()
            .filter(|o| o.status == status)
            .count()
    };
    report.push_str(&format!(
        "Passed: {}/{total}\nFailed: {}/{total}\nErrors: {}/{total}\n",
        count(TestStatus::Pass),
        count(TestStatus::Fail),
        count(TestStatus::Error),
    ));

    let failures: Vec<&TestOutcome> = result
        .outcomes
        .iter()
        .filter(|o| o.status != TestStatus::Pass)
        .collect();
    if !failures.is_empty() {
        report.push_str("\nFailed/Error Test Details:\n");
        report.push_str(&format!("{}\n", "-".repeat(70)));
        for outcome in failures.iter().take(5) {
            report.push_str(&format!(
                "\nTest {}: {}\n   Input: {}\n   Expected: {}\n   Got: {}\n",
                outcome.test_num,
                outcome.description,
                outcome.input,
                outcome.expected,
                outcome.observed()
            ));
        }
        if failures.len() > 5 {
            report.push_str(&format!("\n... and {} more failures\n", failures.len() - 5));
        }
    }

    report.push_str(&format!("\n{rule}\nLAST GENERATED CODE\n{rule}\n"));
    let preview: String = candidate.chars().take(CANDIDATE_PREVIEW_LIMIT).collect();
    report.push_str("```\n");
    report.push_str(&preview);
    if candidate.chars().count() > CANDIDATE_PREVIEW_LIMIT {
        report.push_str(&format!(
            "\n\n... (truncated, showing first {CANDIDATE_PREVIEW_LIMIT} chars)"
        ));
    }
    report.push_str("\n```\n");

    report.push_str(&format!("\n{rule}\nWHAT YOU CAN DO\n{rule}\n"));
    let mut step = 1;
    if !missing.is_empty() {
        report.push_str(&format!("{step}. Install missing modules:\n"));
        for module in &missing {
            if module_available(module) == Some(false) {
                report.push_str(&format!("   pip install {module}\n"));
            }
        }
        step += 1;
    }
    for line in [
        "Review the debugger analysis in the iteration logs above",
        "Manually fix the code based on the test failures",
        "Check that your environment has the required dependencies",
        "Try a simpler version of the problem first",
    ] {
        report.push_str(&format!("{step}. {line}\n"));
        step += 1;
    }
    report.push_str(&format!("{rule}\n"));

    report
}
