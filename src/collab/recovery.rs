//! Concatenated-JSON recovery
//!
//! When two clients race to initialize the same document, the CRDT text
//! field can end up holding a concatenation of complete top-level JSON
//! objects. Auto-save must persist a single valid object, so extraction
//! scans the string counting brace depth, collects each balanced
//! top-level `{...}` span, and keeps the last one. Braces inside string
//! literals are ignored. Returns `None` when no balanced span exists,
//! in which case the caller skips the save attempt.

/// Extract the last complete top-level JSON object from `text`.
pub fn last_complete_object(text: &str) -> Option<&str> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            spans.push((s, i + ch.len_utf8()));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    spans.last().map(|&(s, e)| &text[s..e])
}

/// Recover a parseable editor state from raw CRDT text. Tries the text
/// as-is first; on parse failure falls back to the last balanced span.
pub fn recover_content(text: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if value.is_object() {
            return Some(value);
        }
    }

    let candidate = last_complete_object(text)?;
    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("recovered span still unparseable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_single_object_passes_through() {
        let text = r#"{"blocks":[{"text":"hello"}]}"#;
        assert_eq!(recover_content(text), Some(json!({"blocks":[{"text":"hello"}]})));
    }

    #[test]
    fn test_concatenated_objects_keep_last() {
        let text = r#"{"blocks":["A"]}{"blocks":["B"]}"#;
        assert_eq!(last_complete_object(text), Some(r#"{"blocks":["B"]}"#));
        assert_eq!(recover_content(text), Some(json!({"blocks":["B"]})));
    }

    #[test]
    fn test_three_way_concatenation() {
        let text = r#"{"v":1}{"v":2}{"v":3}"#;
        assert_eq!(recover_content(text), Some(json!({"v":3})));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"text":"closing } brace"}{"text":"{open"}"#;
        assert_eq!(recover_content(text), Some(json!({"text":"{open"})));
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"{"text":"she said \"}\" loudly"}"#;
        assert_eq!(
            recover_content(text),
            Some(json!({"text": "she said \"}\" loudly"}))
        );
    }

    #[test]
    fn test_unbalanced_tail_falls_back_to_last_complete() {
        let text = r#"{"v":1}{"v":2"#;
        assert_eq!(recover_content(text), Some(json!({"v":1})));
    }

    #[test]
    fn test_no_extractable_span() {
        assert_eq!(recover_content(""), None);
        assert_eq!(recover_content("not json at all"), None);
        assert_eq!(recover_content("{never closed"), None);
    }

    #[test]
    fn test_top_level_array_is_not_accepted() {
        // editor state is always an object
        assert_eq!(recover_content(r#"[1,2,3]"#), None);
    }

    proptest! {
        /// Concatenating any two serializable objects always recovers
        /// the second one.
        #[test]
        fn prop_concatenation_keeps_last(
            a in "[a-z]{1,10}",
            b in "[a-z]{1,10}",
            n in 0i64..1000,
        ) {
            let first = json!({"key": a, "n": n});
            let second = json!({"key": b});
            let text = format!("{first}{second}");
            prop_assert_eq!(recover_content(&text), Some(second));
        }

        /// Recovery never panics on arbitrary input.
        #[test]
        fn prop_no_panic_on_garbage(text in ".*") {
            let _ = recover_content(&text);
        }
    }
}
