//! Response extraction: turns raw model text into a JSON value.
//!
//! The only decoration removed is a markdown code fence around the whole reply:
//! after trimming whitespace, a leading ```` ```json ````, ```` ```JSON ```` or bare
//! ```` ``` ```` opener and a trailing ```` ``` ```` closer. Prose before or after the
//! JSON is NOT skipped, and invalid JSON is never repaired.

use serde_json::Value;
use thiserror::Error;

const FENCE_OPENERS: &[&str] = &["```json", "```JSON", "```"];
const FENCE_CLOSER: &str = "```";

#[derive(Debug, Error)]
#[error("Model output is not valid JSON ({message})")]
pub struct MalformedModelOutput {
    /// The reply exactly as the model sent it.
    pub raw: String,
    pub message: String,
}

/// Strips one surrounding code fence, if present.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    match FENCE_OPENERS.iter().find_map(|opener| text.strip_prefix(opener)) {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix(FENCE_CLOSER)
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}

/// Parses model output as JSON after removing a surrounding code fence.
pub fn extract_json(raw: &str) -> Result<Value, MalformedModelOutput> {
    serde_json::from_str(strip_json_fences(raw)).map_err(|e| MalformedModelOutput {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}
