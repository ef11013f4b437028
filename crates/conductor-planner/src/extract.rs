//! Locating a JSON object inside free-form provider output.

/// Byte length of the balanced `{...}` object at the start of `s`, if any.
///
/// Braces inside JSON strings (including escaped quotes) are ignored.
fn balanced_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
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

/// Find the first balanced top-level JSON object in `text`.
///
/// Providers often wrap the object in prose or Markdown fences. Candidates are
/// scanned left to right; the first one that parses as JSON wins. If balanced
/// candidates exist but none parse, the first one is returned so the caller
/// can report why it is malformed. Returns `None` when no balanced object
/// exists at all.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut first_balanced: Option<&str> = None;
    let mut from = 0;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match balanced_len(&text[start..]) {
            Some(len) => {
                let candidate = &text[start..start + len];
                if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                    return Some(candidate);
                }
                first_balanced.get_or_insert(candidate);
                from = start + len;
            }
            None => from = start + 1,
        }
    }
    first_balanced
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_object_wrapped_in_prose_and_fences() {
        let text = "Here is the plan you asked for:\n```json\n{\"tasks\": [{\"id\": \"a\"}]}\n```\nLet me know!";
        assert_eq!(extract_json_object(text), Some(r#"{"tasks": [{"id": "a"}]}"#));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"plan: {"description": "use {curly} and \"quoted }\" text", "n": 2} trailing }"#;
        let extracted = extract_json_object(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_skips_prose_braces_that_are_not_json() {
        let text = r#"Set {placeholder} first. Then: {"strategy": "parallel"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"strategy": "parallel"}"#));
    }

    #[test]
    fn test_returns_first_object_when_several_exist() {
        let text = r#"{"first": true} and {"second": true}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"first": true}"#));
    }

    #[test]
    fn test_unclosed_outer_object_falls_through_to_inner() {
        assert_eq!(extract_json_object(r#"{"tasks": [ {"id": "a"} "#), Some(r#"{"id": "a"}"#));
    }

    #[test]
    fn test_unbalanced_returns_none() {
        assert_eq!(extract_json_object("{ never closed"), None);
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_invalid_balanced_candidate_is_returned_for_diagnostics() {
        let text = "{ tasks: oops }";
        assert_eq!(extract_json_object(text), Some("{ tasks: oops }"));
    }
}
