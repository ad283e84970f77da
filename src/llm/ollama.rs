use std::time::Duration;

use serde_json::Value;

use crate::llm::client::LlmOptions;
use crate::llm::prompt::LlmPrompt;

const OLLAMA_URL: &str = "http://127.0.0.1:11434/api/generate";

pub struct Ollama;

impl Ollama {
    pub fn run(prompt: &LlmPrompt, model: &str, opts: LlmOptions) -> Result<String, String> {
        let body = serde_json::json!({
            "model": model,
            "prompt": format!("{}\n\n{}", prompt.system, prompt.user),
            "stream": false,
            "options": {
                "temperature": opts.temperature,
                "num_predict": opts.max_tokens,
            }
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| e.to_string())?;

        let resp = client
            .post(OLLAMA_URL)
            .json(&body)
            .send()
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        let json: Value = resp.json().map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("ollama error {status}: {json}"));
        }

        json.get("response")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| "ollama response parse failure".to_string())
    }
}
