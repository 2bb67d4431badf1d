//! Recovery of JSON objects from free-form model output.
//!
//! Generative models are asked to answer with JSON only, but routinely wrap
//! the object in code fences, add a sentence before or after it, or leave a
//! trailing comma. [`parse`] tolerates those defects in two passes:
//!
//! 1. Run the cleanup pipeline (strip fences, cut out the `{...}` span,
//!    drop trailing commas, normalize line endings) and parse.
//! 2. On failure, re-extract the `{...}` span from the *original* text with a
//!    regex, drop trailing commas again and parse once more.
//!
//! If both attempts fail the error carries the original text. An empty or
//! non-object result is never returned as success.

mod cleanup;

use serde_json::Value;
use tracing::{debug, warn};

/// Maximum number of raw characters echoed in the error message.
const PREVIEW_CHARS: usize = 200;

/// The model output could not be recovered as a JSON object.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (raw: {preview})")]
pub struct RepairError {
    /// What went wrong on the last attempt.
    pub message: String,
    /// The untouched model output.
    pub raw: String,
    preview: String,
}

impl RepairError {
    fn new(message: impl Into<String>, raw: &str) -> Self {
        Self {
            message: message.into(),
            raw: raw.to_string(),
            preview: preview(raw),
        }
    }
}

/// Recover a JSON object from raw model text.
pub fn parse(raw: &str) -> Result<Value, RepairError> {
    let cleaned = cleanup::run_pipeline(raw);

    let first_error = match parse_object(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(error = %first_error, "cleaned parse failed, retrying on original text");

    let Some(span) = cleanup::regex_object_span(raw) else {
        warn!(raw_len = raw.len(), "no JSON object found in model output");
        return Err(RepairError::new("no JSON object found", raw));
    };

    let retry = cleanup::remove_trailing_commas(span);
    parse_object(&retry).map_err(|e| {
        warn!(raw_len = raw.len(), error = %e, "model output is not recoverable JSON");
        RepairError::new(e, raw)
    })
}

/// Parse `text` and require the top-level value to be an object.
fn parse_object(text: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, got {}", type_name(&other))),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(raw: &str) -> String {
    let mut out: String = raw.chars().take(PREVIEW_CHARS).collect();
    if raw.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}
