//! Small text helpers shared by the parsers

/// Find JSON object slices embedded in free text.
///
/// One pass pairs braces with a stack while respecting string literals and
/// escapes inside an open object; quotes in surrounding prose are ignored.
/// Nested objects are candidates too. Spans are returned in order of their
/// opening brace; callers decide which of them actually deserialize. An
/// opening brace that never closes yields nothing.
pub fn json_objects(text: &str) -> Vec<&str> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable();
    spans.into_iter().map(|(start, end)| &text[start..=end]).collect()
}

/// Truncate to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_object_inside_prose() {
        let text = r#"Sure. {"a": 1} done"#;
        assert_eq!(json_objects(text), vec![r#"{"a": 1}"#]);
    }

    #[test]
    fn test_nested_objects_are_all_candidates() {
        let text = r#"{"outer": {"inner": true}}"#;
        let found = json_objects(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1], r#"{"inner": true}"#);
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"{"text": "a } brace and \" quote"}"#;
        assert_eq!(json_objects(text), vec![text]);
    }

    #[test]
    fn test_unbalanced_is_skipped() {
        assert!(json_objects("{ incomplete").is_empty());
        assert!(json_objects("no braces").is_empty());
    }

    #[test]
    fn test_inner_object_of_unclosed_outer_is_found() {
        let text = r#"{"call": {"name": "date"} and then the reply was cut"#;
        assert_eq!(json_objects(text), vec![r#"{"name": "date"}"#]);
    }

    #[test]
    fn test_prose_quotes_do_not_hide_objects() {
        let text = r#"He said "use this: {"a": 1}"#;
        assert_eq!(json_objects(text), vec![r#"{"a": 1}"#]);
    }

    #[test]
    fn test_long_unbalanced_input_is_scanned_once() {
        let text = format!("{}{}", "{ ".repeat(200_000), r#"{"ok": true}"#);
        assert_eq!(json_objects(&text), vec![r#"{"ok": true}"#]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
