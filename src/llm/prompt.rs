//! Prompt construction for the three collaborators: code generation,
//! test-case generation and debug analysis.

use crate::services::DebugContext;
use crate::state::TestStatus;

const MAX_PROMPT_FAILURES: usize = 10;
const PRIOR_FEEDBACK_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

/* ============================================================
   Code generation
   ============================================================ */

pub fn generation_prompt(problem: &str, feedback: Option<&str>) -> LlmPrompt {
    let system = r#"
You are a senior Python developer specializing in writing correct, efficient code.

Your responsibilities:
- Write one clean, readable Python function that solves the problem
- Handle edge cases (empty input, None, single elements, large inputs)
- Inline any helper logic; the code must be fully self-contained
- ALWAYS include necessary import statements at the TOP

Output rules:
- Provide ONLY the Python code with imports
- Exactly one public top-level function
- No markdown formatting (no backticks)
- No explanations outside the code
"#
    .trim()
    .to_string();

    let user = match feedback {
        Some(fb) => format!(
            "The previous solution to this problem failed verification.\n\n\
             PROBLEM:\n{problem}\n\n\
             DEBUGGER FEEDBACK:\n{fb}\n\n\
             Rewrite the function from scratch, fixing every issue the feedback\n\
             identifies. Output only the corrected code."
        ),
        None => format!(
            "Write a Python function for this problem:\n\n{problem}\n\n\
             Output only the code."
        ),
    };

    LlmPrompt { system, user }
}

/* ============================================================
   Test-case generation
   ============================================================ */

pub fn test_cases_prompt(problem: &str, count: usize, guidance: &str) -> LlmPrompt {
    let system = r#"
You are an expert software tester specializing in comprehensive test case design.

Generate thorough test cases covering:
1. Happy path (typical valid inputs)
2. Edge cases (empty, single element, boundaries)
3. Boundary values (min/max, zero, negative)
4. Invalid inputs (None, wrong types, invalid values)
5. Special cases specific to the problem

Output format: a JSON array of test cases. Each test case must have:
- "description": what this test checks
- "input": the input value(s)
- "expected": the expected output
- "category": one of [happy_path, edge_case, boundary, invalid, special]

Be specific with actual values, not placeholders.
"#
    .trim()
    .to_string();

    let user = format!(
        "Generate {count} comprehensive test cases for this problem:\n\n\
         {problem}\n\n\
         {guidance}\n\
         Requirements:\n\
         1. Read the problem statement VERY CAREFULLY\n\
         2. Make every \"expected\" value match the function's true output type\n\
         3. Cover all categories: happy_path, edge_case, boundary, invalid, special\n\n\
         Input format rules:\n\
         - Single-parameter functions: provide the input directly\n\
         - Multi-parameter functions: provide the inputs as a list\n\
         - Exactly two parameters where the first is itself a list:\n\
           use {{\"pair\": [list, second_argument]}}\n\n\
         Output ONLY the JSON array, nothing else."
    );

    LlmPrompt { system, user }
}

/* ============================================================
   Debug analysis
   ============================================================ */

pub fn debug_prompt(ctx: &DebugContext) -> LlmPrompt {
    let system = r#"
You are an expert code reviewer and debugger with deep knowledge of Python.

Analyze failed code and provide specific, actionable debugging feedback:
1. ROOT CAUSE: the fundamental reason the code failed
2. BUGS IDENTIFIED: exact issues with line references
3. FIX RECOMMENDATIONS: concrete steps to fix each bug
4. EDGE CASES: scenarios that were not handled

Rules:
- Reference exact lines, variables and logic errors
- Explain WHY it failed, not just WHAT failed
- Consider all test failures together to find patterns
- Use clear section headers
"#
    .trim()
    .to_string();

    let mut user = String::new();

    user.push_str("Analyze this code that failed verification.\n\n");
    user.push_str(&format!("ORIGINAL PROBLEM:\n{}\n\n", ctx.problem));

    if ctx.attempt > 1 {
        user.push_str(&format!(
            "ITERATION CONTEXT:\nThis is attempt #{} to fix this code. Previous attempts failed.\n",
            ctx.attempt
        ));
        if let Some(prior) = &ctx.prior_feedback {
            let truncated: String = prior.chars().take(PRIOR_FEEDBACK_LIMIT).collect();
            user.push_str(&format!(
                "Previous feedback was:\n{truncated}...\n(Avoid repeating the same suggestions)\n"
            ));
        }
        user.push('\n');
    }

    user.push_str(&format!("GENERATED CODE:\n{}\n\n", ctx.candidate));
    user.push_str(&format!("OVERALL ERROR:\n{}\n\n", ctx.error_summary));

    user.push_str(&format!(
        "FAILED TEST CASES (showing first {MAX_PROMPT_FAILURES}):\n"
    ));
    for failure in ctx.failures.iter().take(MAX_PROMPT_FAILURES) {
        let marker = match failure.status {
            TestStatus::Error => "!",
            _ => "x",
        };
        user.push_str(&format!(
            "{marker} Test {}: {} - {}\n  Input:    {}\n  Expected: {}\n  Actual:   {}\n",
            failure.test_num,
            failure.status.as_str(),
            failure.description,
            failure.input,
            failure.expected,
            failure.observed()
        ));
    }

    user.push_str(
        "\nProvide detailed debugging analysis with these EXACT section headers:\n\n\
         **ROOT CAUSE ANALYSIS:**\n\
         **BUGS IDENTIFIED:**\n\
         **FIX RECOMMENDATIONS:**\n\
         **EDGE CASES NOT HANDLED:**\n\n\
         Be thorough and specific. The generator will use your feedback to rewrite the code.",
    );

    LlmPrompt { system, user }
}
