use std::fs;
use std::path::Path;

use crate::state::FinalResult;

/// Write the verified candidate source to disk.
pub fn save_candidate(result: &FinalResult, path: &Path) -> Result<(), String> {
    let code = result
        .candidate
        .as_deref()
        .ok_or_else(|| "no candidate to save".to_string())?;
    fs::write(path, code).map_err(|e| e.to_string())
}

/// Write the full run result as pretty JSON for downstream tooling.
pub fn save_result_json(result: &FinalResult, path: &Path) -> Result<(), String> {
    let text = serde_json::to_string_pretty(result).map_err(|e| e.to_string())?;
    fs::write(path, text).map_err(|e| e.to_string())
}
