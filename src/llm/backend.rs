use std::thread;
use std::time::Duration;

use crate::llm::client::{LlmClient, LlmOptions, LlmRunResult};
use crate::llm::ollama::Ollama;
use crate::llm::prompt::LlmPrompt;
use crate::logger::{log, LogLevel};

#[derive(Clone)]
pub enum LlmBackend {
    Ollama { model: String },
    Remote { client: LlmClient },
}

impl LlmBackend {
    pub fn ollama(model: String) -> Self {
        LlmBackend::Ollama { model }
    }

    pub fn remote(client: LlmClient) -> Self {
        LlmBackend::Remote { client }
    }

    pub fn run(&self, prompt: &LlmPrompt, opts: LlmOptions) -> Result<LlmRunResult, String> {
        match self {
            LlmBackend::Ollama { model } => {
                // Ollama has no cache metadata, fabricate a minimal result
                let text = Ollama::run(prompt, model, opts)?;
                Ok(LlmRunResult {
                    text,
                    prompt_hash: "<ollama>".into(),
                    cached_tokens: None,
                })
            }

            LlmBackend::Remote { client } => client.run(prompt, opts),
        }
    }
}

/// Bounded retry around one collaborator call. Transport errors are
/// transient often enough that a short linear backoff is worth it;
/// callers fall back to their local generators once this gives up.
pub fn run_with_retry(
    backend: &LlmBackend,
    prompt: &LlmPrompt,
    opts: LlmOptions,
    attempts: u32,
) -> Result<LlmRunResult, String> {
    let attempts = attempts.max(1);
    let mut last_err = String::new();

    for attempt in 1..=attempts {
        match backend.run(prompt, opts) {
            Ok(result) => {
                if let Some(cached) = result.cached_tokens {
                    log(
                        LogLevel::Info,
                        format!("{cached} prompt tokens served from cache"),
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                last_err = e;
                if attempt < attempts {
                    log(
                        LogLevel::Warn,
                        format!("model call failed ({last_err}), retrying"),
                    );
                    thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
                }
            }
        }
    }

    Err(last_err)
}
