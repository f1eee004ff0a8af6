//! Recovers a JSON object from free-form model text.
//!
//! Models are told to answer with bare JSON but sometimes wrap it in code
//! fences or prose. Recovery runs in a fixed order and stops at the first
//! step that yields a JSON object:
//!
//! 1. trim whitespace and strip a surrounding ```` ```json ```` / ```` ``` ```` fence;
//! 2. if the text starts with `{`, parse it directly;
//! 3. otherwise scan for brace-balanced `{...}` spans, first to last, and
//!    parse each until one succeeds. A `{` that never closes means the output
//!    was cut off, so the scan stops there rather than settling for an
//!    object nested inside it;
//! 4. give up with `AnalysisError::Parse` carrying the truncated raw text.

use serde_json::Value;

use super::{truncate_for_error, AnalysisError};

pub fn extract(raw: &str) -> Result<Value, AnalysisError> {
    let text = strip_code_fences(raw);

    if text.starts_with('{') {
        if let Some(value) = parse_object(text) {
            return Ok(value);
        }
    }

    for (start, _) in text.match_indices('{') {
        let candidate = &text[start..];
        let Some(end) = balanced_end(candidate) else {
            return Err(parse_error("model output truncated: unclosed JSON object", raw));
        };
        if let Some(value) = parse_object(&candidate[..end]) {
            return Ok(value);
        }
    }

    Err(parse_error("no JSON object found in model output", raw))
}

fn parse_error(reason: &str, raw: &str) -> AnalysisError {
    AnalysisError::Parse {
        reason: reason.to_string(),
        raw: truncate_for_error(raw).to_string(),
    }
}

/// Strips one surrounding ```` ```json ... ``` ```` or ```` ``` ... ``` ````
/// fence, plus surrounding whitespace.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest)
        .trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Byte length of the balanced object at the start of `text`, if it closes.
/// Braces inside JSON string literals are ignored.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"jobMatches":[],"cvAnalysis":{"strengths":["Rust"]}}"#;

    #[test]
    fn test_strip_code_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        let input = "  {\"key\": \"value\"}\n";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_fenced_and_bare_extract_identically() {
        let fenced = format!("```json\n{PAYLOAD}\n```");
        assert_eq!(extract(&fenced).unwrap(), extract(PAYLOAD).unwrap());
    }

    #[test]
    fn test_extracts_object_wrapped_in_prose() {
        let raw = format!(
            "Sure! Here is the analysis you asked for:\n{PAYLOAD}\nLet me know if you need more."
        );
        let value = extract(&raw).unwrap();
        assert_eq!(value["cvAnalysis"]["strengths"], json!(["Rust"]));
    }

    #[test]
    fn test_extracts_fenced_block_inside_prose() {
        let raw = format!("Analysis:\n```json\n{PAYLOAD}\n```\nThanks.");
        assert_eq!(extract(&raw).unwrap(), extract(PAYLOAD).unwrap());
    }

    #[test]
    fn test_direct_parse_failure_falls_through_to_scan() {
        // Starts with `{` but has trailing prose, so step 2 fails.
        let raw = format!("{PAYLOAD} -- generated in 3s");
        assert!(extract(&raw).unwrap()["jobMatches"].is_array());
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let raw = r#"Result: {"note": "use } and { freely", "n": 1} done"#;
        assert_eq!(extract(raw).unwrap()["n"], 1);
    }

    #[test]
    fn test_skips_unparseable_leading_braces() {
        let raw = r#"Template {name} filled: {"ok": true}"#;
        assert_eq!(extract(raw).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_top_level_array_is_not_an_object() {
        let err = extract("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }

    #[test]
    fn test_parse_error_carries_truncated_raw_text() {
        let raw = "I'm sorry, I can't help with that. ".repeat(100);
        match extract(&raw) {
            Err(AnalysisError::Parse { raw: shown, .. }) => {
                assert!(shown.starts_with("I'm sorry"));
                assert!(shown.len() < raw.len());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_object_fails() {
        assert!(extract(r#"{"jobMatches": [ "#).is_err());
    }

    #[test]
    fn test_cut_off_output_does_not_yield_nested_object() {
        let raw = concat!(
            r#"{"jobMatches":[{"id":"A","title":"Engineer","suitabilityPercentage":40},"#,
            r#"{"id":"B","title":"#
        );
        match extract(raw) {
            Err(AnalysisError::Parse { reason, .. }) => assert!(reason.contains("truncated")),
            other => panic!("expected parse error, got {other:?}"),
        }

        let fenced = format!("Here you go:\n```json\n{raw}");
        assert!(matches!(extract(&fenced), Err(AnalysisError::Parse { .. })));
    }
}
