//! Cleanup passes applied to raw model output before JSON parsing.
//!
//! Each pass is a function `&str -> String` applied in sequence by
//! [`run_pipeline`]. The order matters: the object span is cut out before
//! trailing commas are removed so prose around the object cannot interfere.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw model text.
pub(crate) fn run_pipeline(raw: &str) -> String {
    let mut result = raw.to_string();

    result = strip_code_fences(&result);
    result = extract_object_span(&result);
    result = remove_trailing_commas(&result);
    result = normalize_line_endings(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Strip Markdown code fences
// ---------------------------------------------------------------------------

/// Remove ```` ```json ```` and ```` ``` ```` markers, keeping the fenced body.
fn strip_code_fences(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```(?:json|JSON)?").expect("valid regex"));

    FENCE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Cut out the object span
// ---------------------------------------------------------------------------

/// Keep only the text from the first `{` to the last `}`.
///
/// Leading or trailing prose the model adds despite instructions is dropped.
/// Text without such a span is returned unchanged.
fn extract_object_span(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 3: Remove trailing commas
// ---------------------------------------------------------------------------

/// Drop commas directly before a closing `}` or `]`.
pub(crate) fn remove_trailing_commas(text: &str) -> String {
    static TRAILING_COMMA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

    TRAILING_COMMA_RE.replace_all(text, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Normalize line endings
// ---------------------------------------------------------------------------

/// Convert CRLF/CR to LF and collapse runs of blank lines into one.
fn normalize_line_endings(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    MULTI_BLANK_RE.replace_all(&unified, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Fallback extraction
// ---------------------------------------------------------------------------

/// Find the greedy `{...}` span in `text` with a regex.
///
/// Used by the second parse attempt against the original, uncleaned text.
pub(crate) fn regex_object_span(text: &str) -> Option<&str> {
    static OBJECT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

    OBJECT_RE.find(text).map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "\n{\"a\": 1}\n");
    }

    #[test]
    fn strips_bare_fence() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "\n{\"a\": 1}\n");
    }

    #[test]
    fn object_span_drops_prose() {
        let input = "Sure! Here you go: {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(extract_object_span(input), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn object_span_without_braces_is_unchanged() {
        assert_eq!(extract_object_span("no json here"), "no json here");
        assert_eq!(extract_object_span("} backwards {"), "} backwards {");
    }

    #[test]
    fn trailing_commas_removed() {
        let input = "{\"a\": [1, 2, 3,], \"b\": {\"c\": 1,\n},}";
        assert_eq!(remove_trailing_commas(input), "{\"a\": [1, 2, 3], \"b\": {\"c\": 1}}");
    }

    #[test]
    fn line_endings_normalized() {
        let input = "{\r\n\"a\": 1,\r\n\r\n\r\n\"b\": 2\r}";
        assert_eq!(normalize_line_endings(input), "{\n\"a\": 1,\n\n\"b\": 2\n}");
    }

    #[test]
    fn regex_span_is_greedy() {
        let text = "x {\"a\": 1} y {\"b\": 2} z";
        assert_eq!(regex_object_span(text), Some("{\"a\": 1} y {\"b\": 2}"));
        assert_eq!(regex_object_span("nothing"), None);
    }

    #[test]
    fn full_pipeline() {
        let input = "Here is the JSON:\n```json\n{\n  \"cards\": [\n    {\"front\": \"a\", \"back\": \"b\"},\n  ],\n}\n```\nLet me know!";
        let cleaned = run_pipeline(input);
        let value: serde_json::Value = serde_json::from_str(&cleaned).expect("valid json");
        assert_eq!(value["cards"][0]["front"], "a");
    }
}
