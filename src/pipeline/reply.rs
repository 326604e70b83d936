//! Reply interpretation: find the JSON object in free-text model output.
//!
//! Models asked for "only the JSON" still wrap it in prose or code fences.
//! Rather than slicing from the first `{` to the last `}`, the text is
//! scanned for `{` at nesting depth zero (braces inside an object, or inside
//! one of its string literals, do not count). Each such opening is tried in
//! order with serde_json's streaming deserializer and the first complete
//! object wins. Stray braces in prose after the object, or a second object,
//! therefore do not corrupt the result, and an object cut off part-way is
//! reported as a parse error instead of yielding one of its inner objects.
//!
//! Outcomes:
//! - an object parses → structured result
//! - the text has no `{` followed later by `}` → the raw response object is
//!   shown instead, so the user always sees something
//! - braces exist but nothing parses → [`ExtractError::Parse`]

use crate::api::ChatCompletionResponse;
use crate::error::{ExtractError, UNEXPECTED_REPLY_SHAPE};
use crate::output::Outcome;
use serde_json::Value;
use tracing::{debug, warn};

/// Result of scanning reply text for a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    /// The first complete JSON object in the text.
    Object(Value),
    /// Braces were present but no object parsed; carries the parser message.
    Unparseable(String),
    /// No `{` followed later by `}`. Also covers text whose only `}` comes
    /// before its first `{`.
    NoBraces,
}

/// Scan `text` for the first complete JSON object.
pub fn locate_json(text: &str) -> Located {
    let (Some(first), Some(last)) = (text.find('{'), text.rfind('}')) else {
        return Located::NoBraces;
    };
    if last < first {
        return Located::NoBraces;
    }

    for i in top_level_openings(text).into_iter().filter(|i| *i <= last) {
        let mut values = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = values.next() {
            debug!("Located JSON object at byte {}", i);
            return Located::Object(value);
        }
    }

    // Report the parser error for the widest candidate span.
    let span = text[first..=last].trim();
    match serde_json::from_str::<Value>(span) {
        Ok(_) => Located::Unparseable("located text is not a JSON object".into()),
        Err(e) => Located::Unparseable(e.to_string()),
    }
}

/// Byte offsets of every `{` that opens a new top-level value.
///
/// Depth is tracked over `{`/`}` (and `[`/`]` inside an object); string
/// literals are skipped while inside an object. A `}` at depth zero is prose and ignored.
fn top_level_openings(text: &str) -> Vec<usize> {
    let mut openings = Vec::new();
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
            '{' => {
                if depth == 0 {
                    openings.push(i);
                }
                depth += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            '[' if depth > 0 => depth += 1,
            ']' if depth > 0 => depth -= 1,
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }
    openings
}

/// Decide the outcome of a successful API call.
///
/// Returns the outcome kind and the JSON value to display.
pub fn interpret(response: &ChatCompletionResponse) -> Result<(Outcome, Value), ExtractError> {
    let content = response.message_content().ok_or_else(|| ExtractError::Api {
        status: None,
        message: UNEXPECTED_REPLY_SHAPE.to_string(),
    })?;

    match locate_json(content) {
        Located::Object(value) => Ok((Outcome::Structured, value)),
        Located::NoBraces => {
            warn!("No JSON object in model reply; showing the raw response");
            Ok((Outcome::RawFallback, response.raw.clone()))
        }
        Located::Unparseable(detail) => Err(ExtractError::Parse { detail }),
    }
}

/// Pretty-print with 2-space indentation, keeping key order.
pub fn to_display(value: &Value) -> Result<String, ExtractError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ExtractError::Internal(format!("JSON serialisation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(content: &str) -> ChatCompletionResponse {
        ChatCompletionResponse::new(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    #[test]
    fn exact_object_is_pretty_printed() {
        let (outcome, value) = interpret(&reply(r#"{"invoice":"A-1","total":12.5}"#)).unwrap();
        assert_eq!(outcome, Outcome::Structured);
        assert_eq!(
            to_display(&value).unwrap(),
            "{\n  \"invoice\": \"A-1\",\n  \"total\": 12.5\n}"
        );
    }

    #[test]
    fn object_inside_prose() {
        let (outcome, value) =
            interpret(&reply("Here is the data: {\"a\":1} — hope this helps")).unwrap();
        assert_eq!(outcome, Outcome::Structured);
        assert_eq!(to_display(&value).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn object_inside_code_fence() {
        let text = "```json\n{\n  \"name\": \"ACME\",\n  \"items\": [1, 2]\n}\n```";
        assert_eq!(
            locate_json(text),
            Located::Object(json!({"name": "ACME", "items": [1, 2]}))
        );
    }

    #[test]
    fn key_order_is_preserved() {
        let Located::Object(value) = locate_json(r#"{"z":1,"a":2,"m":3}"#) else {
            panic!("expected object");
        };
        assert_eq!(to_display(&value).unwrap(), "{\n  \"z\": 1,\n  \"a\": 2,\n  \"m\": 3\n}");
    }

    #[test]
    fn trailing_brace_in_prose_is_ignored() {
        let text = r#"Result: {"a": 1} (note: fields like {name} were empty}"#;
        assert_eq!(locate_json(text), Located::Object(json!({"a": 1})));
    }

    #[test]
    fn first_of_several_objects_wins() {
        let text = r#"{"page": 1} and also {"page": 2}"#;
        assert_eq!(locate_json(text), Located::Object(json!({"page": 1})));
    }

    #[test]
    fn leading_brace_in_prose_is_skipped() {
        let text = r#"Using template {x}: {"a": true}"#;
        assert_eq!(locate_json(text), Located::Object(json!({"a": true})));
    }

    #[test]
    fn truncated_object_is_not_replaced_by_inner_object() {
        let text = r#"{"invoice": {"no": "A-1"}, "lines": [{"qty": 2"#;
        assert!(matches!(locate_json(text), Located::Unparseable(_)));
        let err = interpret(&reply(text)).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn nested_objects_stay_inside_their_parent() {
        let text = r#"Data: {"vendor": {"name": "ACME"}, "lines": [{"qty": 2}]} done"#;
        assert_eq!(
            locate_json(text),
            Located::Object(json!({"vendor": {"name": "ACME"}, "lines": [{"qty": 2}]}))
        );
    }

    #[test]
    fn closing_brace_inside_string_does_not_end_object() {
        // Truncated; the `}` in the string must not expose the inner object.
        let text = r#"{"note": "a } b \" }", "x": {"y": 1}"#;
        assert!(matches!(locate_json(text), Located::Unparseable(_)));
    }

    #[test]
    fn broken_object_with_following_object_is_unparseable() {
        // Unbalanced first candidate swallows the rest of the text.
        let text = r#"{"a": [1, 2} then {"b": 1}"#;
        assert!(matches!(locate_json(text), Located::Unparseable(_)));
    }

    #[test]
    fn no_braces_falls_back_to_raw_response() {
        let resp = reply("I could not read any data in this image.");
        let (outcome, value) = interpret(&resp).unwrap();
        assert_eq!(outcome, Outcome::RawFallback);
        assert_eq!(value, resp.raw);
    }

    #[test]
    fn closing_before_opening_is_no_braces() {
        assert_eq!(locate_json("} nothing {"), Located::NoBraces);
        assert_eq!(locate_json("only an opening {"), Located::NoBraces);
    }

    #[test]
    fn unparseable_braces_are_parse_errors() {
        let err = interpret(&reply("{name: ACME, total: 12}")).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(matches!(locate_json("{'a': 1}"), Located::Unparseable(_)));
    }

    #[test]
    fn missing_message_is_api_error() {
        let resp = ChatCompletionResponse::new(json!({"choices": []}));
        let err = interpret(&resp).unwrap_err();
        assert_eq!(err.to_string(), UNEXPECTED_REPLY_SHAPE);
    }
}
