//! Manual feeding from the console: one `<source-id> <value>` per line.
//! The value is JSON when it parses, otherwise the rest of the line as a
//! string.

use serde_json::Value;

pub fn parse_feed_line(line: &str) -> Option<(&str, Value)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (source_id, raw) = match line.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim()),
        None => (line, ""),
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some((source_id, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_or_text_values() {
        assert_eq!(
            parse_feed_line(r#"s1 {"msg": "hello"}"#),
            Some(("s1", json!({"msg": "hello"})))
        );
        assert_eq!(parse_feed_line("s1   42"), Some(("s1", json!(42))));
        assert_eq!(parse_feed_line("s1 pump on"), Some(("s1", json!("pump on"))));
        assert_eq!(parse_feed_line("s1"), Some(("s1", json!(""))));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_feed_line("   "), None);
        assert_eq!(parse_feed_line("# s1 1"), None);
    }
}
