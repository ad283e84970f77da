mod diagnose;
mod harness;
mod llm;
mod logger;
mod machine;
mod persistence;
mod services;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::harness::TestHarness;
use crate::llm::backend::LlmBackend;
use crate::llm::client::LlmClient;
use crate::logger::{log, LogLevel};
use crate::machine::RepairLoop;
use crate::services::codegen::LlmCodeGenerator;
use crate::services::debugger::LlmDebugAnalyst;
use crate::services::testgen::LlmTestCaseGenerator;
use crate::state::RunConfig;

#[derive(Parser)]
#[command(
    name = "proofloop",
    version,
    about = "Self-verifying code generation: generate a candidate, execute it against generated tests, debug, repeat."
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate and verify a candidate for a problem statement.
    Run {
        /// Problem description the candidate must solve
        problem: String,

        /// Number of test cases to generate
        #[arg(long, default_value_t = 8)]
        tests: usize,

        /// Attempt budget for the generate/verify/debug loop
        #[arg(long, default_value_t = 8)]
        max_attempts: usize,

        /// Per-test wall-clock timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Use a local Ollama model instead of the configured provider
        #[arg(long)]
        ollama: Option<String>,

        /// Write the verified candidate source here on success
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the full run result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Store remote provider credentials for later runs.
    Configure {
        /// Provider name: openai | anthropic
        #[arg(long)]
        provider: String,

        #[arg(long)]
        model: String,

        #[arg(long)]
        api_key: String,

        #[arg(long)]
        base_url: Option<String>,
    },
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Cmd::Run {
            problem,
            tests,
            max_attempts,
            timeout,
            ollama,
            out,
            json,
        } => run(problem, tests, max_attempts, timeout, ollama, out, json),
        Cmd::Configure {
            provider,
            model,
            api_key,
            base_url,
        } => configure(provider, model, api_key, base_url),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    problem: String,
    tests: usize,
    max_attempts: usize,
    timeout: u64,
    ollama: Option<String>,
    out: Option<PathBuf>,
    json: Option<PathBuf>,
) -> ExitCode {
    let backend = match ollama {
        Some(model) => {
            log(LogLevel::Info, format!("using local ollama model {model}"));
            LlmBackend::ollama(model)
        }
        None => LlmBackend::remote(LlmClient::new()),
    };

    let config = RunConfig::new(max_attempts, tests, Duration::from_secs(timeout));
    let repair = RepairLoop::new(
        config.clone(),
        Box::new(LlmTestCaseGenerator::new(backend.clone())),
        Box::new(LlmCodeGenerator::new(backend.clone())),
        Box::new(LlmDebugAnalyst::new(backend)),
        Box::new(TestHarness::new(config.case_timeout)),
    );

    let result = repair.run(&problem);

    if result.success {
        println!("{}", result.candidate.as_deref().unwrap_or(""));
    } else if let Some(report) = &result.report {
        println!("{report}");
    } else {
        log(LogLevel::Error, result.message.clone());
    }

    if let Some(path) = out {
        if result.success {
            match persistence::save_candidate(&result, &path) {
                Ok(()) => log(LogLevel::Success, format!("code saved to {}", path.display())),
                Err(e) => log(LogLevel::Error, format!("failed to save code: {e}")),
            }
        } else {
            log(LogLevel::Warn, "run failed, not writing candidate");
        }
    }

    if let Some(path) = json {
        match persistence::save_result_json(&result, &path) {
            Ok(()) => log(
                LogLevel::Success,
                format!("result written to {}", path.display()),
            ),
            Err(e) => log(LogLevel::Error, format!("failed to write result: {e}")),
        }
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn configure(
    provider: String,
    model: String,
    api_key: String,
    base_url: Option<String>,
) -> ExitCode {
    let client = LlmClient::new();
    match client.configure(&provider, model, api_key, base_url) {
        Ok(()) => {
            log(LogLevel::Success, "provider configuration saved");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log(LogLevel::Error, e);
            ExitCode::FAILURE
        }
    }
}
